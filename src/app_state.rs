use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    config::Config,
    infrastructure::{
        object_store::{ObjectStore, RedisObjectStore},
        secrets::{AesGcmSecretProvider, EncryptionKey, SecretProvider},
    },
    service::{address_service::AddressService, index_allocator::RetryPolicy},
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub address_service: Arc<AddressService>,
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// 按配置创建存储与解密组件
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let store = build_store(&config).await?;

        let key = EncryptionKey::parse(&config.secrets.encryption_key)
            .context("Invalid WALLET_ENC_KEY")?;
        let secrets: Arc<dyn SecretProvider> = Arc::new(AesGcmSecretProvider::new(key));

        Ok(Self::with_components(config, store, secrets))
    }

    /// 使用给定组件组装（测试中注入内存存储）
    pub fn with_components(
        config: Arc<Config>,
        store: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        let address_service = Arc::new(AddressService::new(
            secrets,
            store.clone(),
            config.wallet.clone(),
            RetryPolicy::from(&config.allocator),
        ));

        Self {
            address_service,
            store,
            config,
        }
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    match config.storage.backend.as_str() {
        #[cfg(feature = "dev-tools")]
        "memory" => {
            use crate::infrastructure::object_store::MemoryObjectStore;
            tracing::warn!("Using in-memory index store, indices are lost on restart");
            Ok(Arc::new(MemoryObjectStore::new()))
        }
        "redis" => {
            let store = RedisObjectStore::new(&config.storage.redis_url, &config.storage.key_prefix)
                .await
                .context("Failed to connect to Redis")?;
            tracing::info!(prefix = %config.storage.key_prefix, "Redis index store initialized");
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("Unsupported storage backend '{}'", other),
    }
}
