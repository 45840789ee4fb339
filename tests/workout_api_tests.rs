// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout API tests: aliases, days, exercises and the set log.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use workout_tracker::db::Store;
use workout_tracker::models::{
    NewSet, Profile, ProfileUpdate, SetLogEntry, SubscriptionPlan, UserAlias, Weekday,
};

mod common;
use common::{authed, create_test_app, json_body, TestApp};

/// Onboarded identity `id-w` with primary alias "Wren" on the given days.
async fn seeded_app(days: &[Weekday]) -> TestApp {
    let app = create_test_app();
    let store = app.store.as_ref();
    store
        .insert_profile(&Profile::new("id-w", "Wren"))
        .await
        .unwrap();
    store
        .insert_alias(&UserAlias::primary("Wren", "id-w"))
        .await
        .unwrap();
    store.replace_days("Wren", "id-w", days).await.unwrap();
    app
}

async fn call(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> axum::response::Response {
    app.router
        .clone()
        .oneshot(authed(method, uri, "id-w", body))
        .await
        .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// DAYS AND THE PLAN GATE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_free_plan_blocks_fourth_day() {
    let app = seeded_app(&[Weekday::Monday, Weekday::Wednesday, Weekday::Friday]).await;

    let response = call(
        &app,
        "POST",
        "/api/aliases/Wren/days",
        Some(json!({"day": "Saturday"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "upgrade_required");
    assert_eq!(body["plans"].as_array().unwrap().len(), 3);
    assert_eq!(app.store.list_days("Wren").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_plus_plan_is_never_blocked() {
    let app = seeded_app(&[Weekday::Monday, Weekday::Wednesday, Weekday::Friday]).await;
    app.store
        .update_profile(
            "id-w",
            &ProfileUpdate {
                subscription_plan: Some(SubscriptionPlan::Plus),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    for day in ["Saturday", "Sunday", "Tuesday", "Thursday"] {
        let response = call(
            &app,
            "POST",
            "/api/aliases/Wren/days",
            Some(json!({ "day": day })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED, "{}", day);
    }

    let orders: Vec<u32> = app
        .store
        .list_days("Wren")
        .await
        .unwrap()
        .iter()
        .map(|d| d.order)
        .collect();
    assert_eq!(orders, vec![0, 1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_duplicate_and_last_day_rules() {
    let app = seeded_app(&[Weekday::Monday]).await;

    let response = call(
        &app,
        "POST",
        "/api/aliases/Wren/days",
        Some(json!({"day": "Monday"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = call(&app, "DELETE", "/api/aliases/Wren/days/monday", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = call(&app, "DELETE", "/api/aliases/Wren/days/Sunday", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = call(&app, "DELETE", "/api/aliases/Wren/days/Someday", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ═══════════════════════════════════════════════════════════════════════════
// EXERCISES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_exercise_positions_stay_contiguous() {
    let app = seeded_app(&[Weekday::Monday]).await;

    for name in ["Squats", "Rows", "Dips"] {
        let response = call(
            &app,
            "POST",
            "/api/aliases/Wren/exercises",
            Some(json!({"day": "Monday", "name": name})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = call(
        &app,
        "POST",
        "/api/aliases/Wren/exercises/Monday/move",
        Some(json!({"from": 2, "to": 0})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = call(&app, "DELETE", "/api/aliases/Wren/exercises/Monday/1", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = call(&app, "GET", "/api/aliases/Wren/exercises?day=monday", None).await;
    let body = json_body(response).await;
    let listed: Vec<(String, u64)> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["name"].as_str().unwrap().to_string(),
                e["position"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        listed,
        vec![("Dips".to_string(), 0), ("Rows".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_exercise_rules() {
    let app = seeded_app(&[Weekday::Monday]).await;

    let response = call(
        &app,
        "POST",
        "/api/aliases/Wren/exercises",
        Some(json!({"day": "Tuesday", "name": "Squats"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    call(
        &app,
        "POST",
        "/api/aliases/Wren/exercises",
        Some(json!({"day": "Monday", "name": "Squats"})),
    )
    .await;
    let response = call(
        &app,
        "POST",
        "/api/aliases/Wren/exercises",
        Some(json!({"day": "Monday", "name": "Squats"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = call(
        &app,
        "POST",
        "/api/aliases/Wren/exercises/Monday/move",
        Some(json!({"from": 0, "to": 5})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = call(&app, "DELETE", "/api/aliases/Wren/exercises/Monday/3", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
// SET LOG
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_set_log_lifecycle() {
    let app = seeded_app(&[Weekday::Monday]).await;

    let response = call(
        &app,
        "POST",
        "/api/aliases/Wren/sets",
        Some(json!({"exercise": "Squats", "warmup": "40kg", "weight": "60kg", "reps": "8", "goal": "70kg"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["weight"], "60kg");

    call(
        &app,
        "POST",
        "/api/aliases/Wren/sets",
        Some(json!({"exercise": "Rows", "reps": "10"})),
    )
    .await;

    let response = call(&app, "GET", "/api/aliases/Wren/sets?exercise=Squats", None).await;
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    let response = call(&app, "DELETE", &format!("/api/sets/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = call(&app, "DELETE", &format!("/api/sets/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = call(&app, "DELETE", "/api/aliases/Wren/sets", None).await;
    assert_eq!(json_body(response).await["removed"], 1);
    assert!(app.store.list_sets("Wren", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_set_values_are_length_checked() {
    let app = seeded_app(&[Weekday::Monday]).await;
    let response = call(
        &app,
        "POST",
        "/api/aliases/Wren/sets",
        Some(json!({"exercise": "Squats", "weight": "9".repeat(51)})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ═══════════════════════════════════════════════════════════════════════════
// ALIASES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_rename_cascades_to_dependent_rows() {
    let app = seeded_app(&[Weekday::Monday]).await;
    let store = app.store.as_ref();
    store
        .replace_exercises("Wren", Weekday::Monday, &["Squats".to_string()])
        .await
        .unwrap();
    store
        .insert_set(&SetLogEntry::new(
            "Wren",
            "Squats",
            NewSet {
                warmup: String::new(),
                weight: "60kg".to_string(),
                reps: "8".to_string(),
                goal: String::new(),
            },
        ))
        .await
        .unwrap();

    let response = call(
        &app,
        "PUT",
        "/api/aliases/Wren",
        Some(json!({"username": "Robin"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["username"], "Robin");

    assert!(store.get_alias("Wren").await.is_err());
    assert_eq!(store.list_days("Robin").await.unwrap().len(), 1);
    assert_eq!(store.list_exercises("Robin").await.unwrap().len(), 1);
    assert_eq!(store.list_sets("Robin", None).await.unwrap().len(), 1);
    assert_eq!(store.get_profile("id-w").await.unwrap().display_name, "Robin");
}

#[tokio::test]
async fn test_buddy_alias_lifecycle() {
    let app = seeded_app(&[Weekday::Monday, Weekday::Thursday]).await;

    let response = call(&app, "POST", "/api/aliases", Some(json!({"username": "Sam"}))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    // A new alias starts with the primary's days.
    assert_eq!(app.store.list_days("Sam").await.unwrap().len(), 2);

    let response = call(&app, "POST", "/api/aliases", Some(json!({"username": "Sam"}))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = call(&app, "GET", "/api/aliases", None).await;
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 2);

    let response = call(&app, "DELETE", "/api/aliases/Wren", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = call(&app, "DELETE", "/api/aliases/Sam", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.store.list_days("Sam").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_other_identity_alias_is_forbidden() {
    let app = seeded_app(&[Weekday::Monday]).await;
    app.store
        .insert_alias(&UserAlias::primary("Stranger", "id-other"))
        .await
        .unwrap();

    let response = call(&app, "GET", "/api/aliases/Stranger/days", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = call(&app, "DELETE", "/api/aliases/Stranger/sets", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_me_and_onboarding_status() {
    let app = seeded_app(&[Weekday::Monday]).await;

    let response = call(&app, "GET", "/api/me", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = json_body(response).await;
    assert_eq!(me["auth_id"], "id-w");
    assert_eq!(me["username"], "Wren");

    // No template choice stored yet.
    let response = call(&app, "GET", "/api/onboarding-status", None).await;
    let status = json_body(response).await;
    assert_eq!(status["complete"], false);
    assert_eq!(status["reason"], "no_template");
}
