#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use lms_auth_api::config::AppConfig;
use lms_auth_api::database::models::NewUser;
use lms_auth_api::database::Stores;
use lms_auth_api::routes::{app, AppState};
use lms_auth_api::services::{CredentialStore, Notifier};

/// One delivered notification: (kind, recipient, payload)
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub kind: &'static str,
    pub email: String,
    pub payload: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    fn record(&self, kind: &'static str, email: &str, payload: &str) {
        self.sent.lock().unwrap().push(Sent {
            kind,
            email: email.to_string(),
            payload: payload.to_string(),
        });
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Poll until a notification of `kind` reaches `email`; delivery runs on its own task.
    pub async fn wait_for(&self, kind: &str, email: &str) -> Result<Sent> {
        for _ in 0..200 {
            let found = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|s| s.kind == kind && s.email == email)
                .cloned();
            if let Some(sent) = found {
                return Ok(sent);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        anyhow::bail!("no {} notification for {}", kind, email)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_welcome(&self, email: &str, first_name: &str, _last_name: &str) -> Result<()> {
        self.record("welcome", email, first_name);
        Ok(())
    }

    async fn send_instructor_password(&self, email: &str, _first_name: &str, temporary_password: &str) -> Result<()> {
        self.record("instructor_password", email, temporary_password);
        Ok(())
    }

    async fn send_otp(&self, email: &str, otp: &str) -> Result<()> {
        self.record("otp", email, otp);
        Ok(())
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub notifier: Arc<RecordingNotifier>,
    pub stores: Stores,
}

/// Serve the real router on a free port inside the calling test's runtime,
/// backed by the in-memory store.
pub async fn spawn_app() -> Result<TestApp> {
    let mut config = AppConfig::development();
    config.email.retry_base_delay_ms = 1;
    spawn_app_with(config).await
}

pub async fn spawn_app_with(config: AppConfig) -> Result<TestApp> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;

    let stores = Stores::memory();
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::new(config, stores.clone(), notifier.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state)).await;
    });

    Ok(TestApp {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        notifier,
        stores,
    })
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post(&self, path: &str, body: Value, token: Option<&str>) -> Result<(u16, Value)> {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        Ok((res.status().as_u16(), res.json().await?))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<(u16, Value)> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        Ok((res.status().as_u16(), res.json().await?))
    }

    pub async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>, token: &str) -> Result<(u16, Value)> {
        let mut req = self.client.request(method, self.url(path)).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await?;
        Ok((res.status().as_u16(), res.json().await?))
    }

    pub async fn signup_student(&self, email: &str, password: &str) -> Result<Value> {
        let (status, body) = self
            .post(
                "/api/auth/signup",
                json!({
                    "firstName": "Alice",
                    "lastName": "Smith",
                    "email": email,
                    "mobileNo": "9876543210",
                    "gender": "female",
                    "password": password,
                    "confirmPassword": password,
                }),
                None,
            )
            .await?;
        anyhow::ensure!(status == 201, "signup failed: {} {}", status, body);
        Ok(body["data"].clone())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(u16, Value)> {
        self.post("/api/auth/login", json!({ "email": email, "password": password }), None)
            .await
    }

    /// Seed an admin directly through the credential store and log in as it
    pub async fn admin_token(&self) -> Result<String> {
        CredentialStore::new(self.stores.users.clone())
            .create(NewUser::admin("Root", "Admin", "admin@lms.test", "Admin123"))
            .await?;
        let (status, body) = self.login("admin@lms.test", "Admin123").await?;
        anyhow::ensure!(status == 200, "admin login failed: {}", body);
        Ok(body["data"]["accessToken"].as_str().context("access token")?.to_string())
    }
}
