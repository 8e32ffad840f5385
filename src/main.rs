//! Address Butler 主入口

use std::sync::Arc;

use address_butler::{
    api, app_state::AppState, config::Config, infrastructure::logging::init_logging,
};
use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载 .env（可选）
    dotenvy::dotenv().ok();

    // 2. 加载配置：CONFIG_PATH 指向的文件优先，否则读取环境变量；缺失即中止
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())
        .context("Failed to load configuration")?;
    config.validate()?;

    // 3. 初始化日志
    init_logging(&config.logging)?;

    tracing::info!(
        network = %config.wallet.network,
        bucket = %config.wallet.bucket,
        index_key = %config.wallet.index_key,
        backend = %config.storage.backend,
        "Starting address butler"
    );

    // 4. 初始化应用状态
    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone()).await?);

    // 5. 启动服务器
    let app = api::routes(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    tracing::info!("Server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
