// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store.
//!
//! Enforces the same uniqueness rules as the Firestore layout (alias names,
//! one profile per identity, one assignment per alias and day) so the
//! services behave identically against it. Used for local development
//! (`STORAGE_BACKEND=memory`) and by the test suite, which can queue
//! failures per operation with [`MemoryStore::inject_faults`].

use super::{
    ChangeEvent, ChangeFeed, ChangeOp, Store, StoreError, StoreErrorKind, StoreResult, Table,
};
use crate::models::{
    DayAssignment, ExerciseAssignment, Profile, ProfileUpdate, SetLogEntry, UserAlias, Weekday,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<String, Profile>,
    users: BTreeMap<String, UserAlias>,
    user_days: Vec<DayAssignment>,
    exercises: Vec<ExerciseAssignment>,
    sets: Vec<SetLogEntry>,
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<HashMap<&'static str, VecDeque<StoreErrorKind>>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next calls to `operation` (a [`Store`] method name such as
    /// `"insert_alias"`) fail with the given kinds, one per call.
    pub fn inject_faults(
        &self,
        operation: &'static str,
        kinds: impl IntoIterator<Item = StoreErrorKind>,
    ) {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.entry(operation).or_default().extend(kinds);
    }

    /// Number of faults still queued for `operation`.
    pub fn pending_faults(&self, operation: &'static str) -> usize {
        let faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.get(operation).map_or(0, VecDeque::len)
    }

    fn check_fault(&self, operation: &'static str) -> StoreResult<()> {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        match faults.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(kind) => Err(StoreError::new(
                kind,
                format!("injected fault in {}", operation),
            )),
            None => Ok(()),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: ChangeEvent) {
        self.feed.publish(event);
    }
}

fn sort_days(days: &mut [DayAssignment]) {
    days.sort_by_key(|d| d.order);
}

#[async_trait]
impl Store for MemoryStore {
    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    // ─── Profiles ────────────────────────────────────────────────

    async fn get_profile(&self, id: &str) -> StoreResult<Profile> {
        self.check_fault("get_profile")?;
        self.tables()
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("profile {}", id)))
    }

    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        self.check_fault("insert_profile")?;
        {
            let mut tables = self.tables();
            if tables.profiles.contains_key(&profile.id) {
                return Err(StoreError::conflict(format!(
                    "profile {} already exists",
                    profile.id
                )));
            }
            tables.profiles.insert(profile.id.clone(), profile.clone());
        }
        self.publish(ChangeEvent::new(Table::Profiles, ChangeOp::Insert).for_identity(&profile.id));
        Ok(())
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<Profile> {
        self.check_fault("update_profile")?;
        let updated = {
            let mut tables = self.tables();
            let profile = tables
                .profiles
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found(format!("profile {}", id)))?;
            update.apply(profile);
            profile.clone()
        };
        self.publish(ChangeEvent::new(Table::Profiles, ChangeOp::Update).for_identity(id));
        Ok(updated)
    }

    // ─── Aliases ─────────────────────────────────────────────────

    async fn get_alias(&self, username: &str) -> StoreResult<UserAlias> {
        self.check_fault("get_alias")?;
        self.tables()
            .users
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("alias {}", username)))
    }

    async fn get_primary_alias(&self, auth_id: &str) -> StoreResult<UserAlias> {
        self.check_fault("get_primary_alias")?;
        self.tables()
            .users
            .values()
            .find(|a| a.primary && a.auth_id == auth_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("primary alias for {}", auth_id)))
    }

    async fn list_aliases(&self, auth_id: &str) -> StoreResult<Vec<UserAlias>> {
        self.check_fault("list_aliases")?;
        Ok(self
            .tables()
            .users
            .values()
            .filter(|a| a.auth_id == auth_id)
            .cloned()
            .collect())
    }

    async fn insert_alias(&self, alias: &UserAlias) -> StoreResult<()> {
        self.check_fault("insert_alias")?;
        {
            let mut tables = self.tables();
            if tables.users.contains_key(&alias.username) {
                return Err(StoreError::conflict(format!(
                    "alias {} already exists",
                    alias.username
                )));
            }
            tables.users.insert(alias.username.clone(), alias.clone());
        }
        self.publish(
            ChangeEvent::new(Table::Users, ChangeOp::Insert)
                .for_alias(&alias.username)
                .for_identity(&alias.auth_id),
        );
        Ok(())
    }

    async fn rename_alias(&self, old: &str, new: &str) -> StoreResult<()> {
        self.check_fault("rename_alias")?;
        let auth_id = {
            let mut tables = self.tables();
            if tables.users.contains_key(new) {
                return Err(StoreError::conflict(format!("alias {} already exists", new)));
            }
            let mut alias = tables
                .users
                .remove(old)
                .ok_or_else(|| StoreError::not_found(format!("alias {}", old)))?;
            alias.username = new.to_string();
            let auth_id = alias.auth_id.clone();
            let primary = alias.primary;
            tables.users.insert(new.to_string(), alias);

            for day in tables.user_days.iter_mut().filter(|d| d.username == old) {
                day.username = new.to_string();
            }
            for ex in tables.exercises.iter_mut().filter(|e| e.username == old) {
                ex.username = new.to_string();
            }
            for set in tables.sets.iter_mut().filter(|s| s.username == old) {
                set.username = new.to_string();
            }
            if let Some(profile) = tables.profiles.get_mut(&auth_id) {
                if primary && profile.display_name == old {
                    profile.display_name = new.to_string();
                }
                if profile.buddy_name.as_deref() == Some(old) {
                    profile.buddy_name = Some(new.to_string());
                }
            }
            auth_id
        };

        for table in [Table::Users, Table::UserDays, Table::Exercises, Table::WorkoutSets] {
            self.publish(ChangeEvent::new(table, ChangeOp::Update).for_identity(&auth_id));
        }
        self.publish(ChangeEvent::new(Table::Profiles, ChangeOp::Update).for_identity(&auth_id));
        Ok(())
    }

    async fn delete_alias(&self, username: &str) -> StoreResult<()> {
        self.check_fault("delete_alias")?;
        let alias = {
            let mut tables = self.tables();
            let alias = tables
                .users
                .remove(username)
                .ok_or_else(|| StoreError::not_found(format!("alias {}", username)))?;
            tables.user_days.retain(|d| d.username != username);
            tables.exercises.retain(|e| e.username != username);
            tables.sets.retain(|s| s.username != username);
            alias
        };

        for table in [Table::Users, Table::UserDays, Table::Exercises, Table::WorkoutSets] {
            self.publish(
                ChangeEvent::new(table, ChangeOp::Delete)
                    .for_alias(username)
                    .for_identity(&alias.auth_id),
            );
        }
        Ok(())
    }

    // ─── Workout days ────────────────────────────────────────────

    async fn list_days(&self, username: &str) -> StoreResult<Vec<DayAssignment>> {
        self.check_fault("list_days")?;
        let mut days: Vec<DayAssignment> = self
            .tables()
            .user_days
            .iter()
            .filter(|d| d.username == username)
            .cloned()
            .collect();
        sort_days(&mut days);
        Ok(days)
    }

    async fn insert_day(&self, day: &DayAssignment) -> StoreResult<()> {
        self.check_fault("insert_day")?;
        {
            let mut tables = self.tables();
            if tables
                .user_days
                .iter()
                .any(|d| d.username == day.username && d.day == day.day)
            {
                return Err(StoreError::conflict(format!(
                    "{} already trains on {}",
                    day.username, day.day
                )));
            }
            tables.user_days.push(day.clone());
        }
        self.publish(
            ChangeEvent::new(Table::UserDays, ChangeOp::Insert)
                .for_alias(&day.username)
                .for_identity(&day.auth_id),
        );
        Ok(())
    }

    async fn replace_days(
        &self,
        username: &str,
        auth_id: &str,
        days: &[Weekday],
    ) -> StoreResult<Vec<DayAssignment>> {
        self.check_fault("replace_days")?;
        let assignments: Vec<DayAssignment> = days
            .iter()
            .enumerate()
            .map(|(index, day)| DayAssignment {
                username: username.to_string(),
                day: *day,
                order: index as u32,
                auth_id: auth_id.to_string(),
            })
            .collect();
        {
            let mut tables = self.tables();
            tables.user_days.retain(|d| d.username != username);
            tables.user_days.extend(assignments.iter().cloned());
        }
        self.publish(
            ChangeEvent::new(Table::UserDays, ChangeOp::Update)
                .for_alias(username)
                .for_identity(auth_id),
        );
        Ok(assignments)
    }

    async fn delete_day(&self, username: &str, day: Weekday) -> StoreResult<()> {
        self.check_fault("delete_day")?;
        {
            let mut tables = self.tables();
            let before = tables.user_days.len();
            tables
                .user_days
                .retain(|d| !(d.username == username && d.day == day));
            if tables.user_days.len() == before {
                return Err(StoreError::not_found(format!(
                    "{} does not train on {}",
                    username, day
                )));
            }
            tables
                .exercises
                .retain(|e| !(e.username == username && e.day == day));
        }
        self.publish(ChangeEvent::new(Table::UserDays, ChangeOp::Delete).for_alias(username));
        self.publish(ChangeEvent::new(Table::Exercises, ChangeOp::Delete).for_alias(username));
        Ok(())
    }

    // ─── Exercises ───────────────────────────────────────────────

    async fn list_exercises(&self, username: &str) -> StoreResult<Vec<ExerciseAssignment>> {
        self.check_fault("list_exercises")?;
        let mut exercises: Vec<ExerciseAssignment> = self
            .tables()
            .exercises
            .iter()
            .filter(|e| e.username == username)
            .cloned()
            .collect();
        exercises.sort_by_key(|e| (e.day, e.position));
        Ok(exercises)
    }

    async fn replace_exercises(
        &self,
        username: &str,
        day: Weekday,
        names: &[String],
    ) -> StoreResult<Vec<ExerciseAssignment>> {
        self.check_fault("replace_exercises")?;
        let assignments: Vec<ExerciseAssignment> = names
            .iter()
            .enumerate()
            .map(|(position, name)| ExerciseAssignment {
                username: username.to_string(),
                day,
                name: name.clone(),
                position: position as u32,
            })
            .collect();
        {
            let mut tables = self.tables();
            tables
                .exercises
                .retain(|e| !(e.username == username && e.day == day));
            tables.exercises.extend(assignments.iter().cloned());
        }
        self.publish(ChangeEvent::new(Table::Exercises, ChangeOp::Update).for_alias(username));
        Ok(assignments)
    }

    // ─── Set log ─────────────────────────────────────────────────

    async fn insert_set(&self, entry: &SetLogEntry) -> StoreResult<()> {
        self.check_fault("insert_set")?;
        {
            let mut tables = self.tables();
            if tables.sets.iter().any(|s| s.id == entry.id) {
                return Err(StoreError::conflict(format!("set {} already exists", entry.id)));
            }
            tables.sets.push(entry.clone());
        }
        self.publish(ChangeEvent::new(Table::WorkoutSets, ChangeOp::Insert).for_alias(&entry.username));
        Ok(())
    }

    async fn get_set(&self, id: &str) -> StoreResult<SetLogEntry> {
        self.check_fault("get_set")?;
        self.tables()
            .sets
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("set {}", id)))
    }

    async fn list_sets(
        &self,
        username: &str,
        exercise: Option<&str>,
    ) -> StoreResult<Vec<SetLogEntry>> {
        self.check_fault("list_sets")?;
        let mut sets: Vec<SetLogEntry> = self
            .tables()
            .sets
            .iter()
            .filter(|s| s.username == username)
            .filter(|s| exercise.map_or(true, |name| s.exercise == name))
            .cloned()
            .collect();
        sets.sort_by_key(|s| s.created_at);
        Ok(sets)
    }

    async fn delete_set(&self, id: &str) -> StoreResult<()> {
        self.check_fault("delete_set")?;
        let removed = {
            let mut tables = self.tables();
            let index = tables
                .sets
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| StoreError::not_found(format!("set {}", id)))?;
            tables.sets.remove(index)
        };
        self.publish(ChangeEvent::new(Table::WorkoutSets, ChangeOp::Delete).for_alias(&removed.username));
        Ok(())
    }

    async fn delete_sets_for_alias(&self, username: &str) -> StoreResult<usize> {
        self.check_fault("delete_sets_for_alias")?;
        let removed = {
            let mut tables = self.tables();
            let before = tables.sets.len();
            tables.sets.retain(|s| s.username != username);
            before - tables.sets.len()
        };
        self.publish(ChangeEvent::new(Table::WorkoutSets, ChangeOp::Delete).for_alias(username));
        Ok(removed)
    }
}
