//! 响应格式
//!
//! 成功：{ status, address, network }
//! 失败：{ status, code, message, trace_id? }（见 AppError）

use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::{
    domain::{derivation::ReceivingAddress, network::Network},
    service::address_service::IssuedAddress,
};

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub status: u16,
    pub address: ReceivingAddress,
    pub network: Network,
}

impl From<IssuedAddress> for AddressResponse {
    fn from(issued: IssuedAddress) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            address: issued.address,
            network: issued.network,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage_ok: bool,
    pub version: String,
}

pub fn address_response(issued: IssuedAddress) -> Json<AddressResponse> {
    Json(issued.into())
}
