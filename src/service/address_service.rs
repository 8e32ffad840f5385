//! 收款地址签发服务
//!
//! 一次请求：解密 xpub 与路径 → 校验网络 / 路径 / xpub → 分配索引并派生 → 提交索引。
//! 所有输入校验在触碰计数器之前完成，校验失败不会消耗索引。

use std::sync::Arc;

use serde::Serialize;

use crate::{
    config::WalletConfig,
    domain::{
        derivation::{
            ensure_public_derivable, parse_extended_public_key, HdAddressDeriver,
            ReceivingAddress,
        },
        derivation_path::DerivationPath,
        network::{Network, NetworkParams},
    },
    error::ButlerError,
    infrastructure::{
        object_store::ObjectStore,
        secrets::{SecretProvider, PURPOSE_PATH, PURPOSE_XPUB},
    },
    service::index_allocator::{IndexAllocator, RetryPolicy},
};

/// 明文请求参数
#[derive(Debug, Clone, Copy)]
pub struct AddressRequest<'a> {
    pub xpub: &'a str,
    pub path: &'a str,
    pub network: &'a str,
    pub wallet_id: &'a str,
}

/// 签发结果
#[derive(Debug, Clone, Serialize)]
pub struct IssuedAddress {
    pub address: ReceivingAddress,
    pub network: Network,
    pub index: u64,
}

pub struct AddressService {
    secrets: Arc<dyn SecretProvider>,
    allocator: IndexAllocator,
    deriver: HdAddressDeriver,
    wallet: WalletConfig,
}

impl AddressService {
    pub fn new(
        secrets: Arc<dyn SecretProvider>,
        store: Arc<dyn ObjectStore>,
        wallet: WalletConfig,
        policy: RetryPolicy,
    ) -> Self {
        let allocator = IndexAllocator::new(store, wallet.bucket.clone(), policy);
        Self {
            secrets,
            allocator,
            deriver: HdAddressDeriver::new(),
            wallet,
        }
    }

    pub fn wallet(&self) -> &WalletConfig {
        &self.wallet
    }

    /// 为配置中的钱包签发下一个地址
    ///
    /// 密文每次请求都重新解密，明文不跨请求保留。
    pub async fn next_address(&self) -> Result<IssuedAddress, ButlerError> {
        let xpub = self
            .secrets
            .decrypt_string(&self.wallet.encrypted_xpub, PURPOSE_XPUB)
            .await?;
        let path = self
            .secrets
            .decrypt_string(&self.wallet.encrypted_path, PURPOSE_PATH)
            .await?;

        self.issue(&AddressRequest {
            xpub: &xpub,
            path: &path,
            network: &self.wallet.network,
            wallet_id: &self.wallet.index_key,
        })
        .await
    }

    pub async fn issue(&self, request: &AddressRequest<'_>) -> Result<IssuedAddress, ButlerError> {
        let params = NetworkParams::resolve(request.network)?;
        let path = DerivationPath::parse(request.path)?;
        let master = parse_extended_public_key(request.xpub)?;
        ensure_public_derivable(&path)?;

        let allocation = self
            .allocator
            .allocate_with(request.wallet_id, |index| {
                self.deriver
                    .derive_address(&master, &path, index, &params)
                    .map_err(ButlerError::from)
            })
            .await?;

        tracing::info!(
            wallet_id = %request.wallet_id,
            network = %params.network,
            index = allocation.index,
            attempts = allocation.attempts,
            "Issued receiving address"
        );

        Ok(IssuedAddress {
            address: allocation.value,
            network: params.network,
            index: allocation.index,
        })
    }
}
