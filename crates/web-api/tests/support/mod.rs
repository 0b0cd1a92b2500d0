#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use config::AppConfig;
use reqwest::{Client, Response};
use serde_json::Value;
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use web_api::{router, AppState};

pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        // SSE 长连接不会自己结束，先关闭订阅再停服务
        self.state.registry.close_all();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.broadcast.keep_alive_secs = 1;
    config
}

pub async fn spawn_app(config: AppConfig) -> TestApp {
    let state = AppState::from_config(&config);
    let app = router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        client: Client::new(),
        state,
        shutdown: Some(shutdown_tx),
    }
}

/// 从 SSE 响应中读取 `count` 个 data 帧并解析为 JSON，保活注释会被跳过
pub async fn read_events(response: &mut Response, count: usize) -> Vec<Value> {
    let mut buffer = String::new();
    let mut events = Vec::new();

    while events.len() < count {
        let chunk = timeout(Duration::from_secs(2), response.chunk())
            .await
            .expect("event in time")
            .expect("stream readable")
            .expect("stream still open");
        buffer.push_str(std::str::from_utf8(&chunk).expect("utf-8 frame"));

        while let Some(end) = buffer.find("\n\n") {
            let frame: String = buffer.drain(..end + 2).collect();
            for line in frame.lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    events.push(serde_json::from_str(data.trim()).expect("json frame"));
                }
            }
        }
    }

    events
}

/// 等待注册表达到预期数量
pub async fn wait_for_subscribers(state: &AppState, expected: usize) {
    for _ in 0..50 {
        if state.registry.count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {} subscribers, found {}",
        expected,
        state.registry.count()
    );
}
