//! 生成 XPUB / DERIVATION_PATH 环境变量所需的密文
//!
//! 用法：butler-seal [--key <WALLET_ENC_KEY>] [--check] <plaintext>
//! 未指定 --key 时读取环境变量 WALLET_ENC_KEY。

use address_butler::{
    domain::{derivation::parse_extended_public_key, derivation_path::DerivationPath},
    infrastructure::secrets::{seal, EncryptionKey},
};
use anyhow::{bail, Context, Result};

struct Args {
    key: Option<String>,
    check: bool,
    plaintext: String,
}

fn parse_args() -> Result<Args> {
    let mut key = None;
    let mut check = false;
    let mut plaintext = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--key" => key = Some(args.next().context("--key requires a value")?),
            "--check" => check = true,
            "-h" | "--help" => {
                println!("usage: butler-seal [--key <WALLET_ENC_KEY>] [--check] <plaintext>");
                std::process::exit(0);
            }
            _ if plaintext.is_none() => plaintext = Some(arg),
            _ => bail!("unexpected argument: {}", arg),
        }
    }

    Ok(Args {
        key,
        check,
        plaintext: plaintext.context("missing plaintext argument")?,
    })
}

/// --check：封装前确认明文是合法的 xpub 或派生路径
fn check_plaintext(plaintext: &str) -> Result<&'static str> {
    if plaintext.trim_start().starts_with(['x', 't']) {
        parse_extended_public_key(plaintext)?;
        return Ok("xpub");
    }
    let path = DerivationPath::parse(plaintext)?;
    if !path.is_public_derivable() {
        bail!("path {} contains hardened steps and cannot be derived from an xpub", path);
    }
    Ok("derivation path")
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = parse_args()?;

    let key_str = match args.key {
        Some(key) => key,
        None => std::env::var("WALLET_ENC_KEY").context("WALLET_ENC_KEY must be set")?,
    };
    let key = EncryptionKey::parse(&key_str)?;

    if args.check {
        let kind = check_plaintext(&args.plaintext)?;
        eprintln!("plaintext is a valid {}", kind);
    }

    println!("{}", seal(&args.plaintext, &key)?);
    Ok(())
}
