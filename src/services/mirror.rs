// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-connection mirror of the workout view.
//!
//! A [`WorkoutContext`] holds what one client is looking at: the selected
//! alias and day, that day's exercises, the sets logged for them, and the
//! identity's aliases. Each slice is loaded by a plain fetch function;
//! change-feed callbacks only say *which* slice to reload.

use crate::db::{
    ChangeFilter, LiveFlag, Store, StoreResult, Subscription, Table,
};
use crate::models::{ExerciseAssignment, SetLogEntry, UserAlias, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything the client renders, sent as one SSE payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutSnapshot {
    pub alias: String,
    pub day: Option<Weekday>,
    pub aliases: Vec<UserAlias>,
    pub exercises: Vec<ExerciseAssignment>,
    /// Sets by exercise name, oldest first
    pub sets: BTreeMap<String, Vec<SetLogEntry>>,
}

pub async fn fetch_aliases(store: &dyn Store, auth_id: &str) -> StoreResult<Vec<UserAlias>> {
    store.list_aliases(auth_id).await
}

/// Exercises of `username` on `day`, or on every day when `day` is `None`.
pub async fn fetch_exercises(
    store: &dyn Store,
    username: &str,
    day: Option<Weekday>,
) -> StoreResult<Vec<ExerciseAssignment>> {
    let mut exercises = store.list_exercises(username).await?;
    if let Some(day) = day {
        exercises.retain(|e| e.day == day);
    }
    Ok(exercises)
}

/// Sets of `username` grouped by exercise, limited to `exercises`.
/// Every listed exercise gets an entry, possibly empty.
pub async fn fetch_sets(
    store: &dyn Store,
    username: &str,
    exercises: &[ExerciseAssignment],
) -> StoreResult<BTreeMap<String, Vec<SetLogEntry>>> {
    let mut grouped: BTreeMap<String, Vec<SetLogEntry>> = exercises
        .iter()
        .map(|e| (e.name.clone(), Vec::new()))
        .collect();
    for set in store.list_sets(username, None).await? {
        if let Some(entries) = grouped.get_mut(&set.exercise) {
            entries.push(set);
        }
    }
    Ok(grouped)
}

pub struct WorkoutContext {
    store: Arc<dyn Store>,
    auth_id: String,
    live: LiveFlag,
    state: WorkoutSnapshot,
}

impl WorkoutContext {
    pub fn new(store: Arc<dyn Store>, auth_id: &str, alias: &str, day: Option<Weekday>) -> Self {
        Self {
            store,
            auth_id: auth_id.to_string(),
            live: LiveFlag::new(),
            state: WorkoutSnapshot {
                alias: alias.to_string(),
                day,
                ..Default::default()
            },
        }
    }

    pub fn snapshot(&self) -> &WorkoutSnapshot {
        &self.state
    }

    /// Handle for shutting the context down from elsewhere.
    pub fn live_flag(&self) -> LiveFlag {
        self.live.clone()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_live()
    }

    pub fn shut_down(&self) {
        self.live.shut_down();
    }

    /// The viewed alias is no longer among the identity's aliases, because
    /// it was renamed or deleted. Refetches under the old name come back
    /// empty from then on.
    pub fn alias_gone(&self) -> bool {
        !self
            .state
            .aliases
            .iter()
            .any(|a| a.username == self.state.alias)
    }

    /// Reload every slice. Returns false if the context was shut down
    /// while fetching, in which case nothing was applied.
    pub async fn load(&mut self) -> StoreResult<bool> {
        let aliases = fetch_aliases(self.store.as_ref(), &self.auth_id).await?;
        let exercises =
            fetch_exercises(self.store.as_ref(), &self.state.alias, self.state.day).await?;
        let sets = fetch_sets(self.store.as_ref(), &self.state.alias, &exercises).await?;

        if !self.live.is_live() {
            return Ok(false);
        }
        self.state.aliases = aliases;
        self.state.exercises = exercises;
        self.state.sets = sets;
        Ok(true)
    }

    /// Reload the slices affected by a change to `table`.
    pub async fn refresh(&mut self, table: Table) -> StoreResult<bool> {
        match table {
            Table::Users => {
                let aliases = fetch_aliases(self.store.as_ref(), &self.auth_id).await?;
                if !self.live.is_live() {
                    return Ok(false);
                }
                self.state.aliases = aliases;
            }
            Table::UserDays | Table::Exercises => {
                let exercises =
                    fetch_exercises(self.store.as_ref(), &self.state.alias, self.state.day)
                        .await?;
                let sets = fetch_sets(self.store.as_ref(), &self.state.alias, &exercises).await?;
                if !self.live.is_live() {
                    return Ok(false);
                }
                self.state.exercises = exercises;
                self.state.sets = sets;
            }
            Table::WorkoutSets => {
                let sets =
                    fetch_sets(self.store.as_ref(), &self.state.alias, &self.state.exercises)
                        .await?;
                if !self.live.is_live() {
                    return Ok(false);
                }
                self.state.sets = sets;
            }
            Table::Profiles => return Ok(false),
        }
        Ok(true)
    }

    /// Show a set the client just wrote without waiting for the feed.
    pub fn add_set(&mut self, entry: SetLogEntry) {
        if !self.live.is_live() || entry.username != self.state.alias {
            return;
        }
        let entries = self.state.sets.entry(entry.exercise.clone()).or_default();
        if !entries.iter().any(|e| e.id == entry.id) {
            entries.push(entry);
        }
    }

    /// Drop a set the client just deleted.
    pub fn remove_set(&mut self, id: &str) {
        if !self.live.is_live() {
            return;
        }
        for entries in self.state.sets.values_mut() {
            entries.retain(|e| e.id != id);
        }
    }

    /// Subscribe to every table the snapshot depends on. Each change is
    /// forwarded to `tx` as the table to refresh.
    pub fn subscribe(&self, tx: mpsc::UnboundedSender<Table>) -> Vec<Subscription> {
        let feed = self.store.changes();
        let alias = ChangeFilter::alias(&self.state.alias);

        [
            (Table::WorkoutSets, alias.clone()),
            (Table::Exercises, alias.clone()),
            (Table::UserDays, alias),
            (Table::Users, ChangeFilter::identity(&self.auth_id)),
        ]
        .into_iter()
        .map(|(table, filter)| {
            let tx = tx.clone();
            feed.subscribe(table, filter, move |event| {
                let _ = tx.send(event.table);
            })
        })
        .collect()
    }
}
