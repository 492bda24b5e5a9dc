//! Common test utilities for router tests
//!
//! Builds the full router over the in-memory store, so no database, Redis or
//! mail server is needed:
//! - user seeding with any role
//! - bearer token generation
//! - JSON request helper
//! - access to queued notifications

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use taskhub_api::app::{build_router, AppState};
use taskhub_api::config::Config;
use taskhub_shared::auth::jwt::{create_token, Claims};
use taskhub_shared::auth::password::hash_password;
use taskhub_shared::models::user::{NewUser, Role, User};
use taskhub_shared::notify::{self, Notification};
use taskhub_shared::store::memory::InMemoryStore;
use taskhub_shared::store::UserStore;
use tokio::sync::mpsc::Receiver;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const TEST_PASSWORD: &str = "password123";

/// Test context containing the router and its backing store
pub struct TestContext {
    pub app: Router,
    pub store: Arc<InMemoryStore>,
    pub outbox: Receiver<Notification>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let (queue, outbox) = notify::channel(16);
        let state = AppState::new(store.clone(), queue, Config::for_tests(TEST_SECRET));

        Self {
            app: build_router(state),
            store,
            outbox,
        }
    }

    /// Inserts a user directly into the store
    pub async fn seed_user(&self, username: &str, role: Role) -> User {
        self.store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: hash_password(TEST_PASSWORD).expect("hash"),
                role,
            })
            .await
            .expect("seed user")
    }

    /// Seeds a user and returns it with a valid bearer token
    pub async fn seed_with_token(&self, username: &str, role: Role) -> (User, String) {
        let user = self.seed_user(username, role).await;
        let token = token_for(&user.username);
        (user, token)
    }

    /// Sends a JSON request and returns status and parsed body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.dispatch(request).await
    }

    /// Posts the login form
    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={username}&password={password}")))
            .expect("request");

        self.dispatch(request).await
    }

    /// Notifications queued so far
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(n) = self.outbox.try_recv() {
            seen.push(n);
        }
        seen
    }

    /// Sends a prebuilt request and returns status and parsed body
    pub async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, body)
    }
}

/// Creates a valid bearer token for a username
pub fn token_for(username: &str) -> String {
    let claims = Claims::new(username, chrono::Duration::minutes(30));
    create_token(&claims, TEST_SECRET).expect("token")
}
