//! 环境变量验证器
//! 启动时确认必需的环境变量已设置，缺失即中止，不做降级

/// 必需的环境变量
pub const REQUIRED_VARS: [&str; 6] = [
    "NETWORK",
    "XPUB",
    "DERIVATION_PATH",
    "BUCKET_NAME",
    "INDEX_FILE_NAME",
    "WALLET_ENC_KEY",
];

#[derive(Debug)]
pub struct EnvValidator;

impl EnvValidator {
    /// 验证进程环境变量
    pub fn validate_all() -> Result<(), Vec<String>> {
        Self::validate_with(|name| std::env::var(name).ok())
    }

    /// 使用自定义查找函数验证（便于测试）
    pub fn validate_with<F>(lookup: F) -> Result<(), Vec<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();

        for var in REQUIRED_VARS {
            match lookup(var) {
                Some(value) if !value.trim().is_empty() => {}
                Some(_) => errors.push(format!("{} is set but empty", var)),
                None => errors.push(format!("Not found environment variable '{}'", var)),
            }
        }

        // 验证 REDIS_URL 格式（如果设置）
        if let Some(redis_url) = lookup("REDIS_URL") {
            if !redis_url.starts_with("redis://") && !redis_url.starts_with("rediss://") {
                errors.push("REDIS_URL must start with redis:// or rediss://".to_string());
            }
        }

        // 密钥可以是64位hex、32字节字符串，或至少16字符（将使用SHA256）
        if let Some(enc_key) = lookup("WALLET_ENC_KEY") {
            if !enc_key.is_empty() && enc_key.len() < 16 {
                errors.push("WALLET_ENC_KEY too short (min 16)".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
