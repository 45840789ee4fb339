// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Change notifications.
//!
//! Store backends publish a [`ChangeEvent`] after each committed write.
//! Consumers call [`ChangeFeed::subscribe`] with a table, a scope filter
//! and a callback; the returned [`Subscription`] stops delivery when it is
//! dropped or explicitly unsubscribed.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Users,
    UserDays,
    Exercises,
    WorkoutSets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A committed write. `username`/`auth_id` scope the change when known;
/// `None` means "could be anything in this table".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    pub username: Option<String>,
    pub auth_id: Option<String>,
}

impl ChangeEvent {
    pub fn new(table: Table, op: ChangeOp) -> Self {
        Self {
            table,
            op,
            username: None,
            auth_id: None,
        }
    }

    pub fn for_alias(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn for_identity(mut self, auth_id: &str) -> Self {
        self.auth_id = Some(auth_id.to_string());
        self
    }
}

/// Which events a subscriber cares about. Unset fields match anything,
/// and an event with an unknown scope matches every filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub username: Option<String>,
    pub auth_id: Option<String>,
}

impl ChangeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn alias(username: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            auth_id: None,
        }
    }

    pub fn identity(auth_id: &str) -> Self {
        Self {
            username: None,
            auth_id: Some(auth_id.to_string()),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        fn field_matches(want: &Option<String>, got: &Option<String>) -> bool {
            match (want, got) {
                (Some(w), Some(g)) => w == g,
                _ => true,
            }
        }
        field_matches(&self.username, &event.username)
            && field_matches(&self.auth_id, &event.auth_id)
    }
}

/// Shared flag an async flow checks before touching state it owns.
#[derive(Debug, Clone)]
pub struct LiveFlag(Arc<AtomicBool>);

impl LiveFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn shut_down(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for LiveFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Broadcast of committed writes.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::trace!(?event, "Publishing change");
        let _ = self.tx.send(event);
    }

    /// Call `on_change` for every future event on `table` that matches
    /// `filter`. Must be called from within a tokio runtime.
    ///
    /// If the subscriber falls behind and events are dropped, it receives
    /// one unscoped event for the table so it refetches everything.
    pub fn subscribe<F>(&self, table: Table, filter: ChangeFilter, on_change: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let live = LiveFlag::new();
        let task_live = live.clone();

        let handle = tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(?table, skipped, "Change subscriber lagged");
                        ChangeEvent::new(table, ChangeOp::Update)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !task_live.is_live() {
                    break;
                }
                if event.table == table && filter.matches(&event) {
                    on_change(event);
                }
            }
        });

        Subscription {
            handle: Some(handle),
            live,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Handle returned by [`ChangeFeed::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
    live: LiveFlag,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.live.is_live()
    }

    /// Stop delivery. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.live.shut_down();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}
