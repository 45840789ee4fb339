// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live view (Server-Sent Events) tests.

use axum::http::{header, StatusCode};
use futures_util::StreamExt;
use std::time::Duration;
use tower::ServiceExt;
use workout_tracker::db::Store;
use workout_tracker::models::{NewSet, Profile, SetLogEntry, UserAlias, Weekday};

mod common;
use common::{authed, create_test_app, TestApp};

async fn seeded_app() -> TestApp {
    let app = create_test_app();
    let store = app.store.as_ref();
    store
        .insert_profile(&Profile::new("id-e", "Eve"))
        .await
        .unwrap();
    store
        .insert_alias(&UserAlias::primary("Eve", "id-e"))
        .await
        .unwrap();
    store
        .replace_days("Eve", "id-e", &[Weekday::Monday])
        .await
        .unwrap();
    store
        .replace_exercises("Eve", Weekday::Monday, &["Squats".to_string()])
        .await
        .unwrap();
    app
}

async fn next_chunk(stream: &mut axum::body::BodyDataStream) -> String {
    let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("event within timeout")
        .expect("stream still open")
        .expect("body chunk");
    String::from_utf8(chunk.to_vec()).unwrap()
}

#[tokio::test]
async fn test_snapshot_then_update_on_change() {
    let app = seeded_app().await;

    let response = app
        .router
        .clone()
        .oneshot(authed("GET", "/api/events?day=Monday", "id-e", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let mut stream = response.into_body().into_data_stream();
    let first = next_chunk(&mut stream).await;
    assert!(first.starts_with("event: snapshot"));
    assert!(first.contains("\"Squats\""));
    assert!(!first.contains("60kg"));

    app.store
        .insert_set(&SetLogEntry::new(
            "Eve",
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

    let second = next_chunk(&mut stream).await;
    assert!(second.starts_with("event: snapshot"));
    assert!(second.contains("60kg"));
}

#[tokio::test]
async fn test_dropping_stream_unsubscribes() {
    let app = seeded_app().await;
    let feed_subscribers = || app.store.changes().subscriber_count();
    let before = feed_subscribers();

    let response = app
        .router
        .clone()
        .oneshot(authed("GET", "/api/events", "id-e", None))
        .await
        .unwrap();
    assert_eq!(feed_subscribers(), before + 4);

    drop(response);
    // Subscription tasks are aborted on drop; give them a tick to go away.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(feed_subscribers(), before);
}

#[tokio::test]
async fn test_events_for_foreign_alias_forbidden() {
    let app = seeded_app().await;
    app.store
        .insert_alias(&UserAlias::primary("Mallory", "id-m"))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(authed("GET", "/api/events?alias=Mallory", "id-e", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rename_of_viewed_alias_closes_stream() {
    let app = seeded_app().await;

    let response = app
        .router
        .clone()
        .oneshot(authed("GET", "/api/events?day=Monday", "id-e", None))
        .await
        .unwrap();
    let mut stream = response.into_body().into_data_stream();
    assert!(next_chunk(&mut stream).await.starts_with("event: snapshot"));

    app.store.rename_alias("Eve", "Evelyn").await.unwrap();

    // Changes may arrive in more than one batch; a snapshot can come first.
    let mut gone = None;
    for _ in 0..5 {
        let chunk = next_chunk(&mut stream).await;
        if chunk.starts_with("event: alias_gone") {
            gone = Some(chunk);
            break;
        }
    }
    let gone = gone.expect("alias_gone event");
    assert!(gone.contains("data: Eve\n"));

    let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream ends within timeout");
    assert!(end.is_none());
}
