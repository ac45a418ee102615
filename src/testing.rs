//! Helpers for driving the router end to end in tests.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::app::build_app;
use crate::auth::jwt::{CredentialIssuer, JwtService};
use crate::state::AppState;
use crate::users::memory::MemoryUserDirectory;

pub const TEST_SECRET: &str = "test-secret";

pub fn fake_app() -> (Router, Arc<MemoryUserDirectory>) {
    let (state, users) = AppState::fake();
    (build_app(state), users)
}

/// Token for `email` signed the same way `fake_app` verifies it.
pub fn token_for(email: &str) -> String {
    JwtService::new(TEST_SECRET).unwrap().issue(email).unwrap()
}

pub async fn call(
    app: &Router,
    path: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut req = Request::post(path).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    send(app, req.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn call_raw(app: &Router, path: &str, body: &str) -> (StatusCode, Value) {
    let req = Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    send(app, Request::get(path).body(Body::empty()).unwrap()).await
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}
