//! 测试辅助模块
//! 提供测试配置、密文与应用状态构造
#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use address_butler::{
    app_state::AppState,
    config::{
        AllocatorConfig, Config, LoggingConfig, SecretsConfig, ServerConfig, StorageConfig,
        WalletConfig,
    },
    infrastructure::{
        object_store::ObjectStore,
        secrets::{seal, AesGcmSecretProvider, EncryptionKey},
    },
    service::RetryPolicy,
};

/// 已知测试 xpub
pub const TEST_XPUB: &str = "xpub6ERApfZwUNrhLCkDtcHTcxd75RbzS1ed54G1LkBUHQVHQKqhMkhgbmJbZRkrgZw4koxb5JaHWkY4ALHY2grBGRjaDMzQLcgJvLJuZZvRcEL";

pub const TEST_ENC_KEY: &str = "integration-test-passphrase";

pub const TEST_BUCKET: &str = "butler-test";
pub const TEST_INDEX_KEY: &str = "index";

/// 测试Redis URL
pub fn test_redis_url() -> String {
    std::env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into())
}

pub fn test_key() -> EncryptionKey {
    EncryptionKey::parse(TEST_ENC_KEY).expect("valid test key")
}

/// 重试快、次数足够的策略
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
    }
}

/// 以密文形式写入 xpub 与路径的测试配置
pub fn test_config(path: &str, network: &str) -> Config {
    let key = test_key();
    Config {
        wallet: WalletConfig {
            network: network.to_string(),
            encrypted_xpub: seal(TEST_XPUB, &key).expect("seal xpub"),
            encrypted_path: seal(path, &key).expect("seal path"),
            bucket: TEST_BUCKET.to_string(),
            index_key: TEST_INDEX_KEY.to_string(),
        },
        secrets: SecretsConfig {
            encryption_key: TEST_ENC_KEY.to_string(),
        },
        storage: StorageConfig {
            backend: "memory".to_string(),
            redis_url: test_redis_url(),
            key_prefix: "butler-test".to_string(),
        },
        allocator: AllocatorConfig {
            max_attempts: 32,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
        },
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "text".to_string(),
        },
    }
}

/// 创建测试应用状态
pub fn create_test_app_state(config: Config, store: Arc<dyn ObjectStore>) -> Arc<AppState> {
    let secrets = Arc::new(AesGcmSecretProvider::new(test_key()));
    Arc::new(AppState::with_components(Arc::new(config), store, secrets))
}
