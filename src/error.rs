use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{
    domain::{derivation::DerivationError, derivation_path::PathError, network::NetworkError},
    infrastructure::object_store::StoreError,
};

/// 业务层统一错误
#[derive(Debug, thiserror::Error)]
pub enum ButlerError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// 存储中的索引内容无法解析
    #[error("Corrupt index for wallet '{wallet_id}': {content:?}")]
    CorruptIndex { wallet_id: String, content: String },

    /// 条件写冲突重试次数耗尽
    #[error("Index allocation for wallet '{wallet_id}' conflicted {attempts} times")]
    AllocationConflict { wallet_id: String, attempts: u32 },

    #[error("Secret provider failed ({purpose}): {message}")]
    Secret { purpose: String, message: String },
}

impl ButlerError {
    pub fn secret(purpose: &str, message: impl Into<String>) -> Self {
        Self::Secret {
            purpose: purpose.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    Internal,

    // 业务错误码
    InvalidDerivationPath,
    UnsupportedNetwork,
    InvalidExtendedKey,
    HardenedDerivation,
    IndexOutOfRange,
    CorruptIndex,
    IndexConflict,
    StorageError,
    DecryptionFailed,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::Internal => "internal",
            AppErrorCode::InvalidDerivationPath => "invalid_derivation_path",
            AppErrorCode::UnsupportedNetwork => "unsupported_network",
            AppErrorCode::InvalidExtendedKey => "invalid_extended_key",
            AppErrorCode::HardenedDerivation => "hardened_derivation",
            AppErrorCode::IndexOutOfRange => "index_out_of_range",
            AppErrorCode::CorruptIndex => "corrupt_index",
            AppErrorCode::IndexConflict => "index_conflict",
            AppErrorCode::StorageError => "storage_error",
            AppErrorCode::DecryptionFailed => "decryption_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

/// 错误响应：{ status, code, message, trace_id? }
#[derive(Serialize)]
pub struct ErrorBody<'a> {
    pub status: u16,
    pub code: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: self.status.as_u16(),
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

impl From<ButlerError> for AppError {
    fn from(err: ButlerError) -> Self {
        let message = err.to_string();
        let (code, status) = match &err {
            ButlerError::Path(_) => (
                AppErrorCode::InvalidDerivationPath,
                StatusCode::BAD_REQUEST,
            ),
            ButlerError::Network(_) => (AppErrorCode::UnsupportedNetwork, StatusCode::BAD_REQUEST),
            ButlerError::Derivation(DerivationError::InvalidExtendedKey(_)) => (
                AppErrorCode::InvalidExtendedKey,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            ButlerError::Derivation(DerivationError::HardenedRequiresPrivateKey { .. }) => (
                AppErrorCode::HardenedDerivation,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            ButlerError::Derivation(DerivationError::IndexOutOfRange(_)) => (
                AppErrorCode::IndexOutOfRange,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            ButlerError::Derivation(DerivationError::Bip32(_)) => (
                AppErrorCode::Internal,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            ButlerError::Store(_) => (
                AppErrorCode::StorageError,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            ButlerError::CorruptIndex { .. } => (
                AppErrorCode::CorruptIndex,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            ButlerError::AllocationConflict { .. } => {
                (AppErrorCode::IndexConflict, StatusCode::CONFLICT)
            }
            ButlerError::Secret { .. } => (
                AppErrorCode::DecryptionFailed,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        };
        Self::new(code, status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_errors_are_bad_requests() {
        let err: AppError = ButlerError::from(PathError::Malformed).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, AppErrorCode::InvalidDerivationPath);
        assert_eq!(err.message, "Malformed or empty derivation path");
    }

    #[test]
    fn test_hardened_derivation_is_distinguishable() {
        let err: AppError = ButlerError::from(DerivationError::HardenedRequiresPrivateKey {
            position: 0,
            step: "44'".into(),
        })
        .into();
        assert_eq!(err.code, AppErrorCode::HardenedDerivation);
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_corrupt_index_is_internal() {
        let err: AppError = ButlerError::CorruptIndex {
            wallet_id: "index".into(),
            content: "abc".into(),
        }
        .into();
        assert_eq!(err.code, AppErrorCode::CorruptIndex);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("\"abc\""));
    }
}
