use std::{sync::Arc, time::Instant};

use axum::{
    extract::Request,
    http::{
        header::{CACHE_CONTROL, X_CONTENT_TYPE_OPTIONS},
        HeaderValue,
    },
    middleware::{from_fn, Next},
    response::Response,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{api::middleware::trace_id_middleware, app_state::AppState};

pub mod address_api;
pub mod middleware;
pub mod response;

/// 构建路由
///
/// 只开放 GET；其他方法由路由返回 405。
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/address", get(address_api::next_address))
        .route("/healthz", get(address_api::healthz))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(trace_id_middleware))
                .layer(from_fn(add_response_headers)),
        )
        .with_state(state)
}

async fn add_response_headers(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    // 地址只能使用一次，禁止任何缓存
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        "x-response-time",
        HeaderValue::from_str(&format!("{}ms", start.elapsed().as_millis()))
            .unwrap_or(HeaderValue::from_static("0ms")),
    );
    resp
}
