//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An actor directory (in memory by default, optionally on disk or with a
//!   controlled clock) with a switchable mock payment engine
//! - The full boundary router with test configuration
//! - Plan hooks that record or fail
//! - Request and response helpers

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use userbase_api::actors::stub::{AccountStub, SystemStub, UserStub};
use userbase_api::actors::{Clock, Directory};
use userbase_api::app::{build_router, AppState};
use userbase_api::config::Config;
use userbase_api::login::{complete_login, LoginOptions, LoginOutcome, ProviderLogin};
use userbase_shared::billing::{MockPaymentEngine, PlanHook, PlanRegistry};
use userbase_shared::db::pool::StorageConfig;
use userbase_shared::ids::ActorId;

/// Email treated as an administrator by the test configuration
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Avatar download timeout of the test configuration
pub const AVATAR_FETCH_TIMEOUT_SECS: u64 = 2;

/// Test context containing all necessary resources
pub struct TestContext {
    pub directory: Directory,
    pub payments: Arc<MockPaymentEngine>,
    pub app: axum::Router,
    pub config: Config,
    pub state: AppState,
}

impl TestContext {
    /// Context with the built-in plans
    pub fn new() -> Self {
        Self::with_plans(PlanRegistry::builtin())
    }

    /// Context with a custom plan registry (e.g. with hooks attached)
    pub fn with_plans(plans: PlanRegistry) -> Self {
        Self::build(StorageConfig::in_memory(), plans, Clock::system())
    }

    /// Context whose actors keep their stores under a directory
    pub fn with_storage(storage: StorageConfig) -> Self {
        Self::build(storage, PlanRegistry::builtin(), Clock::system())
    }

    /// Context whose actors read time from `clock`
    pub fn with_clock(clock: Clock) -> Self {
        Self::build(StorageConfig::in_memory(), PlanRegistry::builtin(), clock)
    }

    fn build(storage: StorageConfig, plans: PlanRegistry, clock: Clock) -> Self {
        let config = Config::from_lookup(|key| match key {
            "ADMIN_EMAILS" => Some(ADMIN_EMAIL.to_string()),
            "AVATAR_FETCH_TIMEOUT_SECS" => Some(AVATAR_FETCH_TIMEOUT_SECS.to_string()),
            _ => None,
        })
        .expect("test configuration");

        let payments = Arc::new(MockPaymentEngine::new());
        let directory = Directory::with_clock(storage, plans, payments.clone(), clock);

        let state = AppState::new(directory.clone(), config.clone()).expect("app state");
        let app = build_router(state.clone());

        TestContext {
            directory,
            payments,
            app,
            config,
            state,
        }
    }

    pub fn user(&self, id: &ActorId) -> UserStub {
        UserStub::new(self.directory.clone(), id.clone())
    }

    pub fn account(&self, id: &ActorId) -> AccountStub {
        AccountStub::new(self.directory.clone(), id.clone())
    }

    pub fn system(&self) -> SystemStub {
        SystemStub::new(self.directory.clone())
    }

    /// Logs in a provider identity with a name and email
    pub async fn login(&self, subject_id: &str, name: &str, email: &str) -> LoginOutcome {
        let mut login = ProviderLogin::new("google", subject_id);
        login.profile.insert("id".to_string(), subject_id.into());
        login.profile.insert("name".to_string(), name.into());
        login.profile.insert("email".to_string(), email.into());

        complete_login(&self.directory, login, &self.login_options())
            .await
            .expect("login")
    }

    pub fn login_options(&self) -> LoginOptions {
        LoginOptions::from_state(&self.state)
    }

    /// Sends a request through the public router
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            headers,
            body: body.to_vec(),
        }
    }

    /// GET with an optional session cookie
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, None, cookie)).await
    }

    /// POST a JSON body with an optional session cookie
    pub async fn post(&self, uri: &str, body: JsonValue, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::POST, uri, Some(body), cookie)).await
    }
}

/// Builds a request with an optional JSON body and session cookie pair
pub fn request(
    method: Method,
    uri: &str,
    body: Option<JsonValue>,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Buffered response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> JsonValue {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "{} is not JSON ({}): {}",
                self.status,
                e,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Hook that appends `"<label>:<account_id>"` to a shared log
pub struct RecordingHook {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingHook {
    pub fn new(label: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(RecordingHook { label, log })
    }
}

#[async_trait]
impl PlanHook for RecordingHook {
    async fn run(&self, account_id: &str) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.label, account_id));
        Ok(())
    }
}

/// Hook that always fails
pub struct FailingHook;

#[async_trait]
impl PlanHook for FailingHook {
    async fn run(&self, _account_id: &str) -> anyhow::Result<()> {
        anyhow::bail!("provisioning unavailable")
    }
}
