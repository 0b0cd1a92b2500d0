//! 主应用程序入口
//!
//! 加载配置，装配广播组件并启动 Axum Web API 服务。

use std::{net::SocketAddr, time::Duration};

use config::AppConfig;
use tracing_subscriber::EnvFilter;
use web_api::{cors_layer, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = AppConfig::load()?;
    let state = AppState::from_config(&config);

    spawn_bucket_sweeper(state.clone(), config.rate_limit.sweep_interval());

    let app = router(state.clone()).layer(cors_layer(&config.server.cors_origins));

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "reaction server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(state))
    .await?;

    tracing::info!("reaction server stopped");
    Ok(())
}

/// 定期清理已过期的限流桶，避免来源地址无限累积
fn spawn_bucket_sweeper(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = state.rate_limiter.cleanup_expired_buckets();
            if removed > 0 {
                tracing::debug!(removed, "expired rate limit buckets swept");
            }
        }
    });
}

async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    // SSE 连接不会自行结束，关闭所有订阅让优雅停机可以完成
    let closed = state.registry.close_all();
    tracing::info!(closed, "shutdown signal received, subscriber streams closed");
}
