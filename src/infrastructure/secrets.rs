//! 密文解密（xpub 与派生路径以密文形式配置）
//!
//! 密文格式：base64( nonce(12字节) || AES-256-GCM ciphertext )

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ButlerError;

pub const PURPOSE_XPUB: &str = "xpub";
pub const PURPOSE_PATH: &str = "derivation path";

#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// 解密密文，`purpose` 仅用于错误信息与日志
    async fn decrypt(&self, blob: &str, purpose: &str) -> Result<Vec<u8>, ButlerError>;

    /// 解密并按 UTF-8 解析
    async fn decrypt_string(&self, blob: &str, purpose: &str) -> Result<String, ButlerError> {
        let plaintext = self.decrypt(blob, purpose).await?;
        String::from_utf8(plaintext)
            .map_err(|_| ButlerError::secret(purpose, "plaintext is not valid UTF-8"))
    }
}

/// AES-GCM nonce 长度（字节）
const NONCE_LEN: usize = 12;

/// 加密并编码为配置中使用的 base64 文本
pub fn seal(plaintext: &str, key: &EncryptionKey) -> Result<String> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| anyhow!("Failed to seal plaintext"))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(blob))
}

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// 支持多格式密钥：64位hex、32字节原文，或至少16字符的口令（SHA256）
    pub fn parse(key_str: &str) -> Result<Self> {
        if key_str.is_empty() {
            return Err(anyhow!("WALLET_ENC_KEY empty"));
        }

        let mut key = [0u8; 32];
        if key_str.len() == 64 {
            let mut bytes =
                hex::decode(key_str).map_err(|e| anyhow!("Invalid hex key: {}", e))?;
            key.copy_from_slice(&bytes);
            bytes.zeroize();
        } else if key_str.len() == 32 {
            key.copy_from_slice(key_str.as_bytes());
        } else if key_str.len() >= 16 {
            key.copy_from_slice(&Sha256::digest(key_str.as_bytes()));
        } else {
            return Err(anyhow!("WALLET_ENC_KEY too short (min 16)"));
        }

        Ok(Self::new(key))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(&self.key.into())
    }
}

/// AES-256-GCM 解密实现
pub struct AesGcmSecretProvider {
    key: EncryptionKey,
}

impl AesGcmSecretProvider {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl SecretProvider for AesGcmSecretProvider {
    async fn decrypt(&self, blob: &str, purpose: &str) -> Result<Vec<u8>, ButlerError> {
        let encrypted = STANDARD
            .decode(blob.trim())
            .map_err(|e| ButlerError::secret(purpose, format!("invalid base64: {}", e)))?;

        if encrypted.len() <= NONCE_LEN {
            return Err(ButlerError::secret(purpose, "blob too short"));
        }
        let (nonce, ciphertext) = encrypted.split_at(NONCE_LEN);

        let plaintext = self
            .key
            .cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| ButlerError::secret(purpose, "authentication failed"))?;

        tracing::debug!(purpose = %purpose, "Decrypted secret");
        Ok(plaintext)
    }
}
