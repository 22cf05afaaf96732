#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use application::{Hub, HubHandle};
use config::AppConfig;
use tempfile::TempDir;
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use web_api::{router, AppState};

/// 运行在随机端口上的测试服务器
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: HubHandle,
    pub avatars: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// 轮询直到在线连接数达到预期
    pub async fn wait_for_members(&self, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if self.hub.members().await.expect("hub running").len() == expected {
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry reaches expected size");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn spawn_server() -> TestServer {
    let avatars = tempfile::tempdir().expect("tempdir");

    let mut config = AppConfig::default();
    config.avatar.directory = avatars.path().to_string_lossy().into_owned();

    let hub = Hub::spawn(&config.hub);
    let app = router(AppState::new(hub.clone(), config));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        addr,
        hub,
        avatars,
        shutdown: Some(shutdown_tx),
    }
}

/// 通过登录接口拿到认证 cookie（`name=value` 部分）
pub async fn login(server: &TestServer, name: &str, email: &str) -> (String, serde_json::Value) {
    let response = reqwest::Client::new()
        .post(server.http("/auth/login"))
        .json(&serde_json::json!({ "name": name, "email": email }))
        .send()
        .await
        .expect("login request");
    assert!(response.status().is_success());

    let cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .expect("auth cookie")
        .to_string();
    let body = response.json::<serde_json::Value>().await.expect("login json");
    (cookie, body)
}
