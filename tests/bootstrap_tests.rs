// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account bootstrap tests against the in-process store.
//!
//! These tests verify that:
//! 1. A fresh identity gets exactly one profile and a matching primary alias
//! 2. Alias collisions resolve to the first free suffixed name
//! 3. A second run creates nothing new
//! 4. Transient faults are retried and budget exhaustion is reported

use workout_tracker::db::{MemoryStore, Store, StoreErrorKind};
use workout_tracker::models::{Profile, UserAlias};
use workout_tracker::services::auth_provider::AuthSession;
use workout_tracker::services::bootstrap::{check_postcondition, BootstrapFailure};
use workout_tracker::services::{AccountBootstrap, RetryPolicy, SetupReason};

fn policy() -> RetryPolicy {
    RetryPolicy::immediate(3)
}

#[tokio::test]
async fn test_fresh_identity_gets_profile_and_alias() {
    let store = MemoryStore::new();
    let session = AuthSession::new("id-a", Some("a@b.com"));

    let report = AccountBootstrap::new(&store, policy()).run(&session).await;

    assert!(!report.is_degraded());
    assert!(report.profile_created);
    assert!(report.alias_created);

    let profile = store.get_profile("id-a").await.unwrap();
    assert_eq!(profile.display_name, "a");
    assert_eq!(profile.template_preference, None);

    let alias = store.get_primary_alias("id-a").await.unwrap();
    assert_eq!(alias.username, "a");
    assert!(alias.primary);
    assert_eq!(store.list_aliases("id-a").await.unwrap().len(), 1);

    // Template choice is still missing, so onboarding is not complete.
    assert_eq!(
        check_postcondition(&store, "id-a").await.unwrap(),
        Some(SetupReason::NoTemplate)
    );
}

#[tokio::test]
async fn test_metadata_name_wins_over_email() {
    let store = MemoryStore::new();
    let session = AuthSession::new("id-a", Some("a@b.com")).with_full_name("Alex B");

    let report = AccountBootstrap::new(&store, policy()).run(&session).await;

    assert_eq!(report.alias.unwrap().username, "Alex B");
    assert_eq!(store.get_profile("id-a").await.unwrap().display_name, "Alex B");
}

#[tokio::test]
async fn test_two_signups_with_same_base_name() {
    let store = MemoryStore::new();
    let first = AuthSession::new("id-1", Some("x@example.com")).with_name("Sam");
    let second = AuthSession::new("id-2", Some("y@example.com")).with_name("Sam");

    AccountBootstrap::new(&store, policy()).run(&first).await;
    let report = AccountBootstrap::new(&store, policy()).run(&second).await;

    assert!(!report.is_degraded());
    assert_eq!(store.get_primary_alias("id-1").await.unwrap().username, "Sam");
    assert_eq!(store.get_primary_alias("id-2").await.unwrap().username, "Sam_1");
    // The display name keeps the unsuffixed base.
    assert_eq!(store.get_profile("id-2").await.unwrap().display_name, "Sam");
}

#[tokio::test]
async fn test_all_alias_candidates_taken() {
    let store = MemoryStore::new();
    for (i, name) in ["Sam", "Sam_1", "Sam_2", "Sam_3", "Sam_4", "Sam_5"]
        .iter()
        .enumerate()
    {
        store
            .insert_alias(&UserAlias::primary(*name, format!("other-{}", i)))
            .await
            .unwrap();
    }

    let session = AuthSession::new("id-new", None).with_name("Sam");
    let report = AccountBootstrap::new(&store, policy()).run(&session).await;

    assert!(report.is_degraded());
    assert!(report.profile.is_some());
    assert!(report.alias.is_none());
    assert!(matches!(
        report.failures.as_slice(),
        [BootstrapFailure::AliasUnavailable { base }] if base == "Sam"
    ));
    assert_eq!(
        check_postcondition(&store, "id-new").await.unwrap(),
        Some(SetupReason::NoTemplate)
    );
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let store = MemoryStore::new();
    let session = AuthSession::new("id-a", Some("a@b.com"));

    AccountBootstrap::new(&store, policy()).run(&session).await;
    let report = AccountBootstrap::new(&store, policy()).run(&session).await;

    assert!(!report.is_degraded());
    assert!(!report.profile_created);
    assert!(!report.alias_created);
    assert_eq!(store.list_aliases("id-a").await.unwrap().len(), 1);
    assert_eq!(store.get_primary_alias("id-a").await.unwrap().username, "a");
}

#[tokio::test]
async fn test_existing_profile_name_is_kept() {
    let store = MemoryStore::new();
    store
        .insert_profile(&Profile::new("id-a", "Chosen"))
        .await
        .unwrap();

    let session = AuthSession::new("id-a", Some("a@b.com")).with_name("Metadata");
    let report = AccountBootstrap::new(&store, policy()).run(&session).await;

    assert!(!report.profile_created);
    assert_eq!(report.alias.unwrap().username, "Chosen");
}

#[tokio::test]
async fn test_transient_faults_are_retried() {
    let store = MemoryStore::new();
    store.inject_faults("get_profile", [StoreErrorKind::Transient]);
    store.inject_faults(
        "insert_alias",
        [StoreErrorKind::Transient, StoreErrorKind::Transient],
    );

    let session = AuthSession::new("id-a", Some("a@b.com"));
    let report = AccountBootstrap::new(&store, policy()).run(&session).await;

    assert!(!report.is_degraded(), "failures: {:?}", report.failures);
    assert_eq!(store.pending_faults("get_profile"), 0);
    assert_eq!(store.pending_faults("insert_alias"), 0);
    assert_eq!(store.get_primary_alias("id-a").await.unwrap().username, "a");
}

#[tokio::test]
async fn test_retry_budget_exhaustion_is_reported() {
    let store = MemoryStore::new();
    store.inject_faults("insert_alias", [StoreErrorKind::Transient; 3]);

    let session = AuthSession::new("id-a", Some("a@b.com"));
    let report = AccountBootstrap::new(&store, policy()).run(&session).await;

    assert!(report.is_degraded());
    assert!(report.profile.is_some());
    assert!(matches!(
        report.failures.as_slice(),
        [BootstrapFailure::StepFailed { attempts: 3, .. }]
    ));
    assert!(store.get_primary_alias("id-a").await.is_err());
}
