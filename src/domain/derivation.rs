//! 地址派生
//!
//! 只使用扩展公钥（xpub）做非硬化派生，得到 P2SH-P2WPKH 收款地址。
//! 服务端全程不接触私钥，因此路径中出现硬化步骤时直接报错，不尝试派生。

use std::{fmt, str::FromStr};

use bitcoin::{
    bip32::{ChildNumber, Xpub},
    key::CompressedPublicKey,
    secp256k1::{self, Secp256k1, VerifyOnly},
    Address,
};
use serde::Serialize;

use crate::domain::{
    derivation_path::{DerivationPath, DerivationStep, HARDENED_KEY_START},
    network::NetworkParams,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerivationError {
    #[error("Invalid extended public key: {0}")]
    InvalidExtendedKey(String),
    #[error("Step {step} at position {position} is hardened and requires a private key")]
    HardenedRequiresPrivateKey { position: usize, step: String },
    #[error("Address index {0} is outside the non-hardened range [0, 2147483647]")]
    IndexOutOfRange(u64),
    #[error("BIP32 derivation error: {0}")]
    Bip32(#[from] bitcoin::bip32::Error),
}

/// Base58Check 编码的收款地址
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReceivingAddress(String);

impl ReceivingAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ReceivingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 解析 xpub 字符串（解密后的明文可能带换行，先去掉首尾空白）
pub fn parse_extended_public_key(xpub: &str) -> Result<Xpub, DerivationError> {
    Xpub::from_str(xpub.trim()).map_err(|e| DerivationError::InvalidExtendedKey(e.to_string()))
}

/// HD 地址派生器
///
/// 无内部可变状态：相同输入永远得到相同地址。
pub struct HdAddressDeriver {
    secp: Secp256k1<VerifyOnly>,
}

impl HdAddressDeriver {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }

    /// 在 `path` 之后追加 `index`，派生出对应的收款地址
    pub fn derive_address(
        &self,
        master: &Xpub,
        path: &DerivationPath,
        index: u64,
        network: &NetworkParams,
    ) -> Result<ReceivingAddress, DerivationError> {
        let full_path = path.child(leaf_step(index)?);
        let public_key = self.derive_public_key(master, &full_path)?;
        Ok(encode_p2sh_p2wpkh(&public_key, network))
    }

    /// 沿路径逐级做公钥派生
    pub fn derive_public_key(
        &self,
        master: &Xpub,
        path: &DerivationPath,
    ) -> Result<secp256k1::PublicKey, DerivationError> {
        ensure_public_derivable(path)?;

        let mut key = *master;
        for step in path.steps() {
            let child = ChildNumber::from_normal_idx(step.value())?;
            key = key.ckd_pub(&self.secp, child)?;
        }

        Ok(key.public_key)
    }
}

impl Default for HdAddressDeriver {
    fn default() -> Self {
        Self::new()
    }
}

/// 路径中任何需要私钥的步骤都直接拒绝
pub fn ensure_public_derivable(path: &DerivationPath) -> Result<(), DerivationError> {
    match path.first_private_step() {
        Some((position, step)) => Err(DerivationError::HardenedRequiresPrivateKey {
            position,
            step: step.to_string(),
        }),
        None => Ok(()),
    }
}

fn leaf_step(index: u64) -> Result<DerivationStep, DerivationError> {
    match u32::try_from(index) {
        Ok(value) if value < HARDENED_KEY_START => Ok(DerivationStep::normal(value)),
        _ => Err(DerivationError::IndexOutOfRange(index)),
    }
}

/// 压缩公钥 → HASH160 → P2WPKH 见证程序 → P2SH 脚本哈希 → Base58Check
pub fn encode_p2sh_p2wpkh(
    public_key: &secp256k1::PublicKey,
    network: &NetworkParams,
) -> ReceivingAddress {
    let address = Address::p2shwpkh(&CompressedPublicKey(*public_key), network.network_kind());
    ReceivingAddress(address.to_string())
}
