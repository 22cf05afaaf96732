//! 主应用程序入口
//!
//! 加载配置、启动广播中心并提供 Axum Web 服务。

use anyhow::Context;
use application::Hub;
use config::AppConfig;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("加载配置失败")?;
    let addr = config.bind_addr();

    // 广播中心在独立任务中运行，所有连接共享同一个句柄
    let hub = Hub::spawn(&config.hub);
    let app = router(AppState::new(hub, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;

    tracing::info!("广播服务启动在 http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "无法监听退出信号");
        std::future::pending::<()>().await;
    }
}
