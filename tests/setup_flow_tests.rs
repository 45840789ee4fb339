// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-up and onboarding flow tests, driven through the router.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use workout_tracker::config::Config;
use workout_tracker::db::Store;
use workout_tracker::models::{TemplatePreference, UserAlias, Weekday};
use workout_tracker::services::auth_provider::{AuthSession, StaticAuthProvider};
use workout_tracker::services::check_postcondition;

mod common;
use common::{authed, create_test_app, create_test_app_with, json_body, location, TestApp};

fn signup_app(code: &str, session: AuthSession) -> TestApp {
    create_test_app_with(
        Config::test_default(),
        StaticAuthProvider::new().with_code(code, session),
    )
}

async fn callback(app: &TestApp, code: &str) -> axum::response::Response {
    app.router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/auth/callback?code={}", code))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> axum::response::Response {
    app.router.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn test_signup_with_buddy_and_fresh_days() {
    let app = signup_app("code-a", AuthSession::new("id-a", Some("a@b.com")));

    // Sign-in bootstraps the account and sends the user to forced setup.
    let response = callback(&app, "code-a").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "http://localhost:3000/setup?userId=id-a&force=true&reason=no_template"
    );
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("workout_token="));

    let response = send(&app, authed("GET", "/api/setup", "id-a", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let flow = json_body(response).await;
    assert_eq!(flow["step"], "display_name");
    assert_eq!(flow["forced"], true);
    assert_eq!(flow["display_name"], "a");

    let response = send(
        &app,
        authed(
            "POST",
            "/api/setup/display-name",
            "id-a",
            Some(json!({"displayName": "a"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["step"], "buddy");

    let response = send(
        &app,
        authed(
            "POST",
            "/api/setup/buddy",
            "id-a",
            Some(json!({"hasBuddy": true, "buddyName": "Sam"})),
        ),
    )
    .await;
    assert_eq!(json_body(response).await["step"], "template");

    let response = send(
        &app,
        authed(
            "POST",
            "/api/setup/template",
            "id-a",
            Some(json!({"template": "fresh"})),
        ),
    )
    .await;
    assert_eq!(json_body(response).await["step"], "days");

    let response = send(
        &app,
        authed(
            "POST",
            "/api/setup/days",
            "id-a",
            Some(json!({"days": ["Monday", "Thursday"]})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["flow"]["step"], "complete");
    assert_eq!(body["result"]["username"], "a");
    assert_eq!(body["result"]["buddy"], "Sam");

    let profile = app.store.get_profile("id-a").await.unwrap();
    assert_eq!(profile.display_name, "a");
    assert!(profile.has_buddy);
    assert_eq!(profile.buddy_name.as_deref(), Some("Sam"));
    assert_eq!(
        profile.template_preference,
        Some(TemplatePreference::Fresh)
    );

    assert!(app.store.get_alias("a").await.is_ok());
    assert!(app.store.get_alias("Sam").await.is_ok());

    for username in ["a", "Sam"] {
        let days: Vec<(Weekday, u32)> = app
            .store
            .list_days(username)
            .await
            .unwrap()
            .into_iter()
            .map(|d| (d.day, d.order))
            .collect();
        assert_eq!(days, vec![(Weekday::Monday, 0), (Weekday::Thursday, 1)]);
        // Fresh start: no template exercises.
        assert!(app.store.list_exercises(username).await.unwrap().is_empty());
    }

    assert_eq!(check_postcondition(app.store.as_ref(), "id-a").await.unwrap(), None);
    assert!(!app.state.setup_sessions.contains_key("id-a"));
}

#[tokio::test]
async fn test_template_choice_seeds_exercises() {
    let app = create_test_app();
    let store = app.store.as_ref();
    workout_tracker::services::AccountBootstrap::new(store, app.state.bootstrap_retry)
        .run(&AuthSession::new("id-t", Some("tess@example.com")))
        .await;

    for (uri, body) in [
        ("/api/setup/display-name", json!({"displayName": "tess"})),
        ("/api/setup/buddy", json!({"hasBuddy": false})),
        ("/api/setup/template", json!({"template": "template"})),
        ("/api/setup/days", json!({"days": ["Monday", "Tuesday"]})),
    ] {
        let response = send(&app, authed("POST", uri, "id-t", Some(body))).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }

    let exercises = store.list_exercises("tess").await.unwrap();
    let monday: Vec<_> = exercises
        .iter()
        .filter(|e| e.day == Weekday::Monday)
        .map(|e| (e.name.as_str(), e.position))
        .collect();
    assert_eq!(monday[0], ("Chest Press", 0));
    assert_eq!(monday.len(), 4);
    // Tuesday has no template exercises.
    assert!(exercises.iter().all(|e| e.day != Weekday::Tuesday));
}

#[tokio::test]
async fn test_back_keeps_answers_and_wrong_step_conflicts() {
    let app = create_test_app();
    workout_tracker::services::AccountBootstrap::new(app.store.as_ref(), app.state.bootstrap_retry)
        .run(&AuthSession::new("id-b", Some("bo@example.com")))
        .await;

    let response = send(
        &app,
        authed(
            "POST",
            "/api/setup/buddy",
            "id-b",
            Some(json!({"hasBuddy": false})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    send(
        &app,
        authed(
            "POST",
            "/api/setup/display-name",
            "id-b",
            Some(json!({"displayName": "Bo"})),
        ),
    )
    .await;

    let response = send(&app, authed("POST", "/api/setup/back", "id-b", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let flow = json_body(response).await;
    assert_eq!(flow["step"], "display_name");
    assert_eq!(flow["display_name"], "Bo");

    let response = send(&app, authed("POST", "/api/setup/back", "id-b", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The rename carried over to the alias.
    assert_eq!(
        app.store.get_primary_alias("id-b").await.unwrap().username,
        "Bo"
    );
}

#[tokio::test]
async fn test_forced_flow_cannot_be_cancelled() {
    let app = create_test_app();
    workout_tracker::services::AccountBootstrap::new(app.store.as_ref(), app.state.bootstrap_retry)
        .run(&AuthSession::new("id-c", Some("cy@example.com")))
        .await;

    let response = send(&app, authed("POST", "/api/setup/cancel", "id-c", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_optional_flow_can_be_cancelled() {
    let app = signup_app("code-d", AuthSession::new("id-d", Some("di@example.com")));
    callback(&app, "code-d").await;
    for (uri, body) in [
        ("/api/setup/display-name", json!({"displayName": "di"})),
        ("/api/setup/buddy", json!({"hasBuddy": false})),
        ("/api/setup/template", json!({"template": "fresh"})),
        ("/api/setup/days", json!({"days": ["Friday"]})),
    ] {
        send(&app, authed("POST", uri, "id-d", Some(body))).await;
    }

    // Onboarding is complete; reopening without force is optional.
    let response = send(&app, authed("GET", "/api/setup", "id-d", None)).await;
    assert_eq!(json_body(response).await["forced"], false);

    let response = send(&app, authed("POST", "/api/setup/cancel", "id-d", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["cancelled"], true);
    assert!(!app.state.setup_sessions.contains_key("id-d"));
}

#[tokio::test]
async fn test_display_name_taken_by_someone_else() {
    let app = create_test_app();
    for (id, email) in [("id-1", "sam@example.com"), ("id-2", "kim@example.com")] {
        workout_tracker::services::AccountBootstrap::new(
            app.store.as_ref(),
            app.state.bootstrap_retry,
        )
        .run(&AuthSession::new(id, Some(email)))
        .await;
    }

    let response = send(
        &app,
        authed(
            "POST",
            "/api/setup/display-name",
            "id-2",
            Some(json!({"displayName": "sam"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        app.store.get_primary_alias("id-2").await.unwrap().username,
        "kim"
    );
}

async fn complete_setup(app: &TestApp, auth_id: &str, steps: [(&str, serde_json::Value); 4]) {
    for (uri, body) in steps {
        let response = send(app, authed("POST", uri, auth_id, Some(body))).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

async fn day_orders(app: &TestApp, username: &str) -> Vec<(Weekday, u32)> {
    app.store
        .list_days(username)
        .await
        .unwrap()
        .into_iter()
        .map(|d| (d.day, d.order))
        .collect()
}

#[tokio::test]
async fn test_buddy_name_taken_by_another_account_gets_suffix() {
    let app = signup_app("code-s", AuthSession::new("id-s", Some("sol@example.com")));
    app.store
        .insert_alias(&UserAlias::primary("Sam", "id-other"))
        .await
        .unwrap();
    callback(&app, "code-s").await;

    for (uri, body) in [
        ("/api/setup/display-name", json!({"displayName": "sol"})),
        ("/api/setup/buddy", json!({"hasBuddy": true, "buddyName": "Sam"})),
        ("/api/setup/template", json!({"template": "fresh"})),
    ] {
        let response = send(&app, authed("POST", uri, "id-s", Some(body))).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
    let response = send(
        &app,
        authed(
            "POST",
            "/api/setup/days",
            "id-s",
            Some(json!({"days": ["Monday"]})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["result"]["buddy"], "Sam_1");
    assert_eq!(body["flow"]["buddy_name"], "Sam_1");

    let profile = app.store.get_profile("id-s").await.unwrap();
    assert_eq!(profile.buddy_name.as_deref(), Some("Sam_1"));

    let buddy = app.store.get_alias("Sam_1").await.unwrap();
    assert_eq!(buddy.auth_id, "id-s");
    assert!(!buddy.primary);
    assert_eq!(day_orders(&app, "Sam_1").await, vec![(Weekday::Monday, 0)]);

    // The other account's alias is left alone.
    assert_eq!(app.store.get_alias("Sam").await.unwrap().auth_id, "id-other");
    assert!(day_orders(&app, "Sam").await.is_empty());
}

#[tokio::test]
async fn test_rerunning_setup_replaces_days() {
    let app = signup_app("code-r", AuthSession::new("id-r", Some("rae@example.com")));
    callback(&app, "code-r").await;

    complete_setup(
        &app,
        "id-r",
        [
            ("/api/setup/display-name", json!({"displayName": "rae"})),
            ("/api/setup/buddy", json!({"hasBuddy": true, "buddyName": "Lou"})),
            ("/api/setup/template", json!({"template": "fresh"})),
            ("/api/setup/days", json!({"days": ["Monday", "Thursday", "Saturday"]})),
        ],
    )
    .await;
    assert_eq!(day_orders(&app, "rae").await.len(), 3);

    // Reopen setup from settings and pick different days.
    let response = send(&app, authed("GET", "/api/setup", "id-r", None)).await;
    assert_eq!(json_body(response).await["step"], "display_name");
    complete_setup(
        &app,
        "id-r",
        [
            ("/api/setup/display-name", json!({"displayName": "rae"})),
            ("/api/setup/buddy", json!({"hasBuddy": true, "buddyName": "Lou"})),
            ("/api/setup/template", json!({"template": "fresh"})),
            ("/api/setup/days", json!({"days": ["Friday", "Tuesday"]})),
        ],
    )
    .await;

    for username in ["rae", "Lou"] {
        assert_eq!(
            day_orders(&app, username).await,
            vec![(Weekday::Friday, 0), (Weekday::Tuesday, 1)]
        );
    }
    // Same buddy name again reuses the buddy alias.
    assert_eq!(app.store.list_aliases("id-r").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_setup_requires_session() {
    let app = create_test_app();
    let response = send(
        &app,
        Request::builder()
            .uri("/api/setup")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
