//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use site_cms::auth::ManualClock;
use site_cms::config::Config;
use site_cms::server::{AppState, Server};

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "correct horse battery staple";

/// A running server backed by a temporary directory
pub struct TestContext {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestContext {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn content_path(&self) -> std::path::PathBuf {
        self.dir.path().join("content.json")
    }

    pub fn backup_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("backups")
    }

    pub fn upload_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Fixed start time for the manual clock
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Content document with every required section
pub fn sample_content() -> Value {
    json!({
        "site": {"title": "Northwind Studio"},
        "hero": {"headline": "We build calm software"},
        "about": {"body": "A small team."},
        "services": [{"name": "Design"}]
    })
}

/// Configuration rooted in `dir`, ready to validate
pub fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.auth.admin_username = ADMIN_USER.to_string();
    config.auth.admin_password = Some(ADMIN_PASS.to_string());
    config.auth.secret_key = Some("integration-test-secret".to_string());
    config.auth.failure_delay_ms = 500;
    config.content.path = dir.path().join("content.json").display().to_string();
    config.content.backup_dir = dir.path().join("backups").display().to_string();
    config.upload.dir = dir.path().join("uploads").display().to_string();
    config
}

/// Start a server with the default test configuration
pub async fn spawn_app() -> TestContext {
    spawn_app_with(|_| {}).await
}

/// Start a server after letting the caller adjust the configuration
pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestContext {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join("backups")).expect("Failed to create backup dir");
    std::fs::write(
        dir.path().join("content.json"),
        serde_json::to_vec_pretty(&sample_content()).unwrap(),
    )
    .expect("Failed to write content");

    let mut config = create_test_config(&dir);
    customize(&mut config);

    let clock = Arc::new(ManualClock::new(start_time()));
    let state =
        AppState::from_config(&config, clock.clone()).expect("Failed to build app state");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = Server::new(config.server.clone(), state);

    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    TestContext {
        addr,
        dir,
        clock,
        shutdown: Some(shutdown_tx),
    }
}

/// Log in and return the bearer token
pub async fn login(ctx: &TestContext) -> String {
    let response = reqwest::Client::new()
        .post(ctx.url("/api/auth"))
        .json(&json!({"username": ADMIN_USER, "password": ADMIN_PASS}))
        .send()
        .await
        .expect("Login request failed");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Invalid login body");
    body["token"]
        .as_str()
        .expect("Login response has no token")
        .to_string()
}
