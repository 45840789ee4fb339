// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use std::sync::Arc;
use workout_tracker::config::Config;
use workout_tracker::db::{FirestoreDb, MemoryStore};
use workout_tracker::middleware::auth::create_jwt;
use workout_tracker::routes::create_router;
use workout_tracker::services::auth_provider::StaticAuthProvider;
use workout_tracker::services::payments::RecordingPaymentProvider;
use workout_tracker::services::RetryPolicy;
use workout_tracker::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test app wired to in-process fakes.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub payments: Arc<RecordingPaymentProvider>,
}

/// Create a test app with default config and no known auth codes.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default(), StaticAuthProvider::new())
}

/// Create a test app with the given config and auth codes. Bootstrap
/// retries run without delays.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config, auth: StaticAuthProvider) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let payments = Arc::new(RecordingPaymentProvider::new());

    let mut state = AppState::new(config, store.clone(), Arc::new(auth), payments.clone());
    state.bootstrap_retry = RetryPolicy::immediate(3);
    let state = Arc::new(state);

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        payments,
    }
}

/// Session token for `auth_id` signed with the test key.
#[allow(dead_code)]
pub fn create_test_jwt(auth_id: &str) -> String {
    create_jwt(auth_id, &Config::test_default().jwt_signing_key).expect("JWT creation")
}

/// Authenticated request with an optional JSON body.
#[allow(dead_code)]
pub fn authed(method: &str, uri: &str, auth_id: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", create_test_jwt(auth_id)),
        );
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Unauthenticated JSON POST.
#[allow(dead_code)]
pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `Location` header of a redirect.
#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect location")
        .to_str()
        .unwrap()
        .to_string()
}
