#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use tarefas_api::auth::{AuthError, Principal, TokenVerifier};
use tarefas_api::config::{AllowedOrigins, CorsConfig};
use tarefas_api::database::models::{NewTask, Task, TaskPatch};
use tarefas_api::database::{MemoryTaskStore, StoreError, TaskStore};
use tarefas_api::{app, cors_layer, AppState};

pub const READER: &str = "reader-token";
pub const CREATOR: &str = "creator-token";
pub const UPDATER: &str = "updater-token";
pub const DELETER: &str = "deleter-token";
pub const ADMIN: &str = "admin-token";

/// Maps fixed token strings to principals, no network involved
pub struct FakeVerifier {
    tokens: HashMap<String, Principal>,
}

impl FakeVerifier {
    pub fn new() -> Self {
        let tokens = [
            (READER, Principal::new("auth0|reader", Vec::<String>::new())),
            (CREATOR, Principal::new("auth0|creator", ["create:tasks"])),
            (UPDATER, Principal::new("auth0|updater", ["update:tasks"])),
            (DELETER, Principal::new("auth0|deleter", ["delete:tasks"])),
            (
                ADMIN,
                Principal::new("auth0|admin", ["create:tasks", "update:tasks", "delete:tasks"]),
            ),
        ]
        .into_iter()
        .map(|(token, principal)| (token.to_string(), principal))
        .collect();

        Self { tokens }
    }
}

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown test token".to_string()))
    }
}

/// Store whose backend is down: every call fails as a lost connection would
pub struct FailingStore;

fn unreachable_backend() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl TaskStore for FailingStore {
    async fn insert(&self, _task: NewTask) -> Result<Task, StoreError> {
        Err(unreachable_backend())
    }

    async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        Err(unreachable_backend())
    }

    async fn update(&self, _id: Uuid, _patch: TaskPatch) -> Result<Option<Task>, StoreError> {
        Err(unreachable_backend())
    }

    async fn delete(&self, _id: Uuid) -> Result<bool, StoreError> {
        Err(unreachable_backend())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(unreachable_backend())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn TaskStore>,
}

/// Fresh router over an empty in-memory store
pub fn test_app() -> TestApp {
    test_app_with(
        Arc::new(FakeVerifier::new()),
        CorsConfig {
            origins: AllowedOrigins::Any,
        },
    )
}

pub fn test_app_with(verifier: Arc<dyn TokenVerifier>, cors: CorsConfig) -> TestApp {
    build(Arc::new(MemoryTaskStore::new()), verifier, cors)
}

/// Router over the given store, with the fake verifier and open CORS
pub fn test_app_with_store(store: Arc<dyn TaskStore>) -> TestApp {
    build(
        store,
        Arc::new(FakeVerifier::new()),
        CorsConfig {
            origins: AllowedOrigins::Any,
        },
    )
}

fn build(store: Arc<dyn TaskStore>, verifier: Arc<dyn TokenVerifier>, cors: CorsConfig) -> TestApp {
    let router = app(AppState::new(store.clone(), verifier), cors_layer(&cors));
    TestApp { router, store }
}

impl TestApp {
    /// Send a request and decode the JSON body (`Value::Null` when empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(json)?))?,
            None => builder.body(Body::empty())?,
        };

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    pub async fn create(&self, body: &Value) -> Result<Value> {
        let (status, created) = self.send(Method::POST, "/tarefas", Some(ADMIN), Some(body)).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create failed: {} {}", status, created);
        Ok(created)
    }

    pub async fn list(&self) -> Result<Vec<Value>> {
        let (status, body) = self.send(Method::GET, "/tarefas", Some(READER), None).await?;
        anyhow::ensure!(status == StatusCode::OK, "list failed: {} {}", status, body);
        Ok(serde_json::from_value(body)?)
    }
}
