//! # Common Test Utilities
//!
//! `TestApp` spawns the real router on a random port with a temporary
//! database and upload directory, and offers helpers for obtaining tokens
//! for each role.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use kbase_server::config::{ActivityConfig, AppConfig};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::{path::PathBuf, time::Duration};
use tempfile::{tempdir, TempDir};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

pub const PASSWORD: &str = "correct horse battery";
pub const SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub upload_dir: PathBuf,
    _dir: TempDir,
    server: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        let _ = tracing_subscriber_init();
        let dir = tempdir()?;
        let upload_dir = dir.path().join("uploads");
        let config = AppConfig {
            port: 0,
            db_url: dir.path().join("kbase.db").to_string_lossy().into_owned(),
            jwt_secret: SECRET.to_string(),
            jwt_expiry_hours: 1,
            upload_dir: upload_dir.to_string_lossy().into_owned(),
            frontend_url: None,
            bcrypt_cost: 4,
            max_upload_bytes: 20 * 1024 * 1024,
            activity: ActivityConfig {
                channel_capacity: 256,
                cleanup_interval_hours: 0,
            },
        };

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = format!("http://{}", listener.local_addr()?);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = kbase_server::run(listener, config, shutdown).await {
                eprintln!("Server error: {e}");
            }
        });

        let app = TestApp {
            address,
            client: Client::new(),
            upload_dir,
            _dir: dir,
            server: Some(server),
            shutdown_tx: Some(shutdown_tx),
        };
        app.wait_until_ready().await?;
        Ok(app)
    }

    async fn wait_until_ready(&self) -> Result<()> {
        for _ in 0..100 {
            if let Ok(resp) = self.client.get(self.url("/api/health")).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Err(anyhow!("server did not become ready"))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, email: &str) -> Result<(String, Value)> {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "password": PASSWORD, "name": email }))
            .send()
            .await?;
        if resp.status() != StatusCode::CREATED {
            return Err(anyhow!("register failed: {}", resp.text().await?));
        }
        let body: Value = resp.json().await?;
        let token = body["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("no token"))?
            .to_string();
        Ok((token, body["user"].clone()))
    }

    pub async fn login(&self, email: &str) -> Result<String> {
        let body: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("no token"))
    }

    /// Registers the first account, which becomes `super_admin`.
    pub async fn super_admin(&self) -> Result<String> {
        Ok(self.register("root@example.com").await?.0)
    }

    /// Registers `email`, gives it exactly `role` and returns a fresh token
    /// carrying that role.
    pub async fn user_with_role(&self, admin_token: &str, email: &str, role: &str) -> Result<String> {
        let (_, user) = self.register(email).await?;
        let id = user["id"].as_str().ok_or_else(|| anyhow!("no id"))?;
        self.client
            .put(self.url(&format!("/api/users/{id}/roles")))
            .bearer_auth(admin_token)
            .json(&json!({ "roles": [role] }))
            .send()
            .await?
            .error_for_status()?;
        self.login(email).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    pub async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
        body: Value,
    ) -> Result<Response> {
        Ok(self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?)
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<Response> {
        self.send_json(reqwest::Method::POST, path, token, body).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> Result<Response> {
        self.send_json(reqwest::Method::PATCH, path, token, body).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await?)
    }

    /// Creates a section and returns its id.
    pub async fn section(&self, token: &str, name: &str, slug: &str) -> Result<String> {
        let body: Value = self
            .post("/api/sections", token, json!({ "name": name, "slug": slug }))
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body["id"].as_str().unwrap_or_default().to_string())
    }

    /// Creates a draft page and returns its JSON.
    pub async fn page(&self, token: &str, section_id: &str, title: &str) -> Result<Value> {
        Ok(self
            .post(
                "/api/pages",
                token,
                json!({ "section_id": section_id, "title": title }),
            )
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

fn tracing_subscriber_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
}
