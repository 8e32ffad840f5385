//! 派生性能基准测试
//! 使用criterion进行性能测试

use address_butler::domain::{
    derivation::{parse_extended_public_key, HdAddressDeriver},
    derivation_path::DerivationPath,
    network::NetworkParams,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const XPUB: &str = "xpub6ERApfZwUNrhLCkDtcHTcxd75RbzS1ed54G1LkBUHQVHQKqhMkhgbmJbZRkrgZw4koxb5JaHWkY4ALHY2grBGRjaDMzQLcgJvLJuZZvRcEL";

fn bench_path_parsing(c: &mut Criterion) {
    c.bench_function("parse_derivation_path", |b| {
        b.iter(|| DerivationPath::parse(black_box("m/44/0x0/0b1/0'")))
    });
}

fn bench_address_derivation(c: &mut Criterion) {
    let master = parse_extended_public_key(XPUB).unwrap();
    let path = DerivationPath::parse("m/44/0/1/0").unwrap();
    let params = NetworkParams::resolve("mainnet").unwrap();
    let deriver = HdAddressDeriver::new();

    let mut index = 0u64;
    c.bench_function("derive_p2sh_p2wpkh_address", |b| {
        b.iter(|| {
            index = (index + 1) % 1_000;
            deriver.derive_address(&master, &path, black_box(index), &params)
        })
    });
}

criterion_group!(benches, bench_path_parsing, bench_address_derivation);
criterion_main!(benches);
