//! 配置管理模块
//! 支持从环境变量和配置文件加载配置
//!
//! 钱包相关配置（网络、xpub 密文、路径密文、bucket、索引文件）没有默认值，
//! 缺失时直接返回错误，请求处理前即中止。

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    domain::network::NetworkParams, infrastructure::env_validator::EnvValidator,
    infrastructure::secrets::EncryptionKey,
};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub wallet: WalletConfig,
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 钱包配置（全部必填）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// mainnet / testnet / regtest
    pub network: String,
    /// 加密后的 xpub（base64）
    pub encrypted_xpub: String,
    /// 加密后的派生路径（base64）
    pub encrypted_path: String,
    /// 索引所在容器
    pub bucket: String,
    /// 索引对象名，同时作为钱包标识
    pub index_key: String,
}

/// 解密配置
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    pub encryption_key: String,
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("encryption_key", &"<redacted>")
            .finish()
    }
}

/// 索引存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "redis" or "memory"
    pub backend: String,
    pub redis_url: String,
    pub key_prefix: String,
}

/// 索引分配重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::from_lookup(&env_lookup)
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            backoff_base_ms: 10,
            backoff_max_ms: 500,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(&env_lookup)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_lookup(&env_lookup)
    }
}

type Lookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn required(lookup: &Lookup<'_>, name: &str) -> Result<String> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Not found environment variable '{}'", name))
}

/// 未设置时取默认值，设置了但无法解析则报错
fn parsed_or<T: std::str::FromStr>(lookup: &Lookup<'_>, name: &str, default: T) -> Result<T> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!("{} must be an unsigned integer, got '{}'", name, raw)
        }),
    }
}

impl WalletConfig {
    fn from_lookup(lookup: &Lookup<'_>) -> Result<Self> {
        Ok(Self {
            network: required(lookup, "NETWORK")?,
            encrypted_xpub: required(lookup, "XPUB")?,
            encrypted_path: required(lookup, "DERIVATION_PATH")?,
            bucket: required(lookup, "BUCKET_NAME")?,
            index_key: required(lookup, "INDEX_FILE_NAME")?,
        })
    }
}

impl SecretsConfig {
    fn from_lookup(lookup: &Lookup<'_>) -> Result<Self> {
        Ok(Self {
            encryption_key: required(lookup, "WALLET_ENC_KEY")?,
        })
    }
}

impl StorageConfig {
    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        Self {
            backend: lookup("STORAGE_BACKEND").unwrap_or_else(|| "redis".into()),
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
            key_prefix: lookup("STORAGE_KEY_PREFIX").unwrap_or_else(|| "butler".into()),
        }
    }
}

impl AllocatorConfig {
    fn from_lookup(lookup: &Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_attempts: parsed_or(lookup, "ALLOCATOR_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff_base_ms: parsed_or(lookup, "ALLOCATOR_BACKOFF_BASE_MS", defaults.backoff_base_ms)?,
            backoff_max_ms: parsed_or(lookup, "ALLOCATOR_BACKOFF_MAX_MS", defaults.backoff_max_ms)?,
        })
    }
}

impl ServerConfig {
    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8088".into()),
        }
    }
}

impl LoggingConfig {
    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        Self {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            format: lookup("LOG_FORMAT").unwrap_or_else(|| "text".into()),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        if let Err(errors) = EnvValidator::validate_all() {
            anyhow::bail!("Environment validation failed: {}", errors.join("; "));
        }
        Self::from_lookup(&env_lookup)
    }

    /// 使用自定义查找函数加载（便于测试）
    pub fn from_lookup(lookup: &Lookup<'_>) -> Result<Self> {
        Ok(Self {
            wallet: WalletConfig::from_lookup(lookup)?,
            secrets: SecretsConfig::from_lookup(lookup)?,
            storage: StorageConfig::from_lookup(lookup),
            allocator: AllocatorConfig::from_lookup(lookup)?,
            server: ServerConfig::from_lookup(lookup),
            logging: LoggingConfig::from_lookup(lookup),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 配置文件存在时以文件为准，否则读取环境变量
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        if let Some(path) = path {
            if path.as_ref().exists() {
                return Self::from_file(path);
            }
            tracing::warn!(path = ?path.as_ref(), "Config file not found, falling back to environment");
        }

        Self::from_env()
    }

    /// 验证配置有效性，一次性报告所有问题
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if let Err(e) = NetworkParams::resolve(&self.wallet.network) {
            errors.push(e.to_string());
        }

        for (name, value) in [
            ("XPUB", &self.wallet.encrypted_xpub),
            ("DERIVATION_PATH", &self.wallet.encrypted_path),
            ("BUCKET_NAME", &self.wallet.bucket),
            ("INDEX_FILE_NAME", &self.wallet.index_key),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{} must not be empty", name));
            }
        }

        if let Err(e) = EncryptionKey::parse(&self.secrets.encryption_key) {
            errors.push(e.to_string());
        }

        match self.storage.backend.as_str() {
            "redis" => {
                if !self.storage.redis_url.starts_with("redis://")
                    && !self.storage.redis_url.starts_with("rediss://")
                {
                    errors.push("REDIS_URL must start with redis:// or rediss://".to_string());
                }
            }
            "memory" if cfg!(feature = "dev-tools") => {}
            "memory" => errors.push(
                "STORAGE_BACKEND 'memory' requires the dev-tools feature".to_string(),
            ),
            other => errors.push(format!(
                "STORAGE_BACKEND must be 'redis' or 'memory', got '{}'",
                other
            )),
        }

        if self.allocator.max_attempts == 0 {
            errors.push("ALLOCATOR_MAX_ATTEMPTS must be at least 1".to_string());
        }
        if self.allocator.backoff_base_ms > self.allocator.backoff_max_ms {
            errors.push(
                "ALLOCATOR_BACKOFF_BASE_MS must not exceed ALLOCATOR_BACKOFF_MAX_MS".to_string(),
            );
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            errors.push(format!("LOG_LEVEL must be one of: {:?}", valid_levels));
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            errors.push("LOG_FORMAT must be 'json' or 'text'".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration: {}", errors.join("; "))
        }
    }
}
