//! 地址签发 API

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};

use crate::{
    api::{
        middleware::TraceId,
        response::{address_response, AddressResponse, HealthResponse},
    },
    app_state::AppState,
    error::AppError,
};

/// GET /api/v1/address
pub async fn next_address(
    State(state): State<Arc<AppState>>,
    trace_id: Option<Extension<TraceId>>,
) -> Result<Json<AddressResponse>, AppError> {
    match state.address_service.next_address().await {
        Ok(issued) => Ok(address_response(issued)),
        Err(err) => {
            let app_error = AppError::from(err);
            if app_error.status.is_server_error() {
                tracing::error!(code = app_error.code.as_str(), error = %app_error.message, "Address issuance failed");
            } else {
                tracing::warn!(code = app_error.code.as_str(), error = %app_error.message, "Address request rejected");
            }
            Err(match trace_id {
                Some(Extension(trace_id)) => app_error.with_trace_id(trace_id.0),
                None => app_error,
            })
        }
    }
}

/// GET /healthz
pub async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let storage_ok = state.store.ping().await.is_ok();
    let (status_code, status) = if storage_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            storage_ok,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
