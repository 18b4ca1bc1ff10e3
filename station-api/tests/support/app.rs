//! Router harness over an in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use station_api::{create_router, ApiConfig, AppState};
use station_core::{LogbookDraft, QsoDraft};
use station_test_utils::InMemoryStore;
use tower::ServiceExt;

pub const REGISTER: &str = "/api/logbook/register";
pub const INSERT_QSO: &str = "/api/qso/insert";

pub const UNAUTHORIZED_BODY: &str = r#"{"code":"UNAUTHORIZED","message":"Unauthorized"}"#;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: InMemoryStore,
}

pub fn test_app(store: InMemoryStore) -> TestApp {
    test_app_with(store, ApiConfig::default())
}

pub fn test_app_with(store: InMemoryStore, config: ApiConfig) -> TestApp {
    let state = AppState::new(Arc::new(store.clone()), config).expect("Failed to build state");
    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

/// Response status and raw body bytes.
pub struct Reply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec();
    Reply { status, body }
}

pub async fn post_raw(router: &Router, path: &str, body: impl Into<Body>) -> Reply {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .expect("build request");
    send(router, request).await
}

pub async fn post_json(router: &Router, path: &str, body: Value) -> Reply {
    post_raw(router, path, body.to_string()).await
}

pub async fn get(router: &Router, path: &str) -> Reply {
    let request = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .expect("build request");
    send(router, request).await
}

pub fn register_envelope(callsign: &str, password: &str, draft: &LogbookDraft) -> Value {
    json!({
        "callsign": callsign,
        "key": password,
        "action": "register_logbook",
        "logbook": draft,
    })
}

pub fn qso_envelope(callsign: &str, key: &str, qso: &QsoDraft) -> Value {
    json!({
        "callsign": callsign,
        "key": key,
        "action": "insert_qso",
        "qso": qso,
    })
}
