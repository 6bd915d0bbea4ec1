#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use notes_api::auth::TokenService;
use notes_api::config::AppConfig;
use notes_api::database::MemoryStore;
use notes_api::{router, AppState};

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// The real router over a fresh in-memory store, served on its own port.
///
/// Each `#[tokio::test]` owns a runtime, so every test starts its own server;
/// it is aborted when the handle drops.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: Client,
    pub tokens: TokenService,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let mut config = AppConfig::development();
        config.security.bcrypt_cost = 4;
        config.security.jwt_secret = TEST_JWT_SECRET.to_string();
        Self::start_with(config).await
    }

    pub async fn start_with(config: AppConfig) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let tokens = TokenService::new(&config.security);
        let state = AppState::new(&config, Arc::new(MemoryStore::new()))?;
        let app = router(state, &config);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            client: Client::new(),
            tokens,
            handle,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.client.get(self.url(path)).bearer_auth(token).send().await?)
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> Result<Response> {
        Ok(self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> Result<Response> {
        Ok(self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.client.delete(self.url(path)).bearer_auth(token).send().await?)
    }

    /// Register an account and return `(userId, token, refreshToken)`.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(i64, String, String)> {
        let resp = self
            .post_json(
                "/register",
                &json!({"name": name, "email": email, "password": password, "role": "user"}),
            )
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "register failed: {}", resp.status());

        let body: Value = resp.json().await?;
        Ok((
            body["userId"].as_i64().context("userId missing")?,
            body["token"].as_str().context("token missing")?.to_string(),
            body["refreshToken"].as_str().context("refreshToken missing")?.to_string(),
        ))
    }

    /// Create a note and return its JSON.
    pub async fn create_note(&self, token: &str, title: &str, visibility: &str) -> Result<Value> {
        let resp = self
            .post_auth("/notes", token, &json!({"title": title, "visibility": visibility}))
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "create failed: {}", resp.status());
        Ok(resp.json().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
