// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Everyday workout operations: aliases, day assignments, exercise lists
//! and the set log.
//!
//! Every operation is scoped to the calling identity. An alias owned by
//! another identity is reported as forbidden.

use crate::db::{Store, StoreResultExt};
use crate::error::{AppError, Result};
use crate::models::{
    DayAssignment, ExerciseAssignment, NewSet, ProfileUpdate, SetLogEntry, UserAlias, Weekday,
};
use crate::services::setup::{validate_display_name, MAX_NAME_LEN};
use crate::services::subscription::ensure_day_allowed;
use validator::Validate;

pub struct WorkoutService<'a> {
    store: &'a dyn Store,
    auth_id: &'a str,
}

fn validate_exercise_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "exercise name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "exercise name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

fn alias_name(name: &str) -> Result<String> {
    validate_display_name(name).map_err(AppError::from)
}

impl<'a> WorkoutService<'a> {
    pub fn new(store: &'a dyn Store, auth_id: &'a str) -> Self {
        Self { store, auth_id }
    }

    /// Load an alias and check that the caller owns it.
    pub async fn owned_alias(&self, username: &str) -> Result<UserAlias> {
        let alias = self.store.get_alias(username).await?;
        if alias.auth_id != self.auth_id {
            tracing::warn!(
                auth_id = self.auth_id,
                username,
                "Attempt to access another identity's alias"
            );
            return Err(AppError::Forbidden(format!("alias {} is not yours", username)));
        }
        Ok(alias)
    }

    // ─── Aliases ─────────────────────────────────────────────────

    pub async fn list_aliases(&self) -> Result<Vec<UserAlias>> {
        Ok(self.store.list_aliases(self.auth_id).await?)
    }

    /// Add a non-primary alias. It starts with the primary alias's days.
    pub async fn create_alias(&self, name: &str) -> Result<UserAlias> {
        let name = alias_name(name)?;
        let alias = UserAlias::buddy(&name, self.auth_id);
        self.store.insert_alias(&alias).await.map_err(|e| {
            if e.is_conflict() {
                AppError::Conflict(format!("the name {} is already taken", name))
            } else {
                e.into()
            }
        })?;

        if let Some(primary) = self.store.get_primary_alias(self.auth_id).await.optional()? {
            let days: Vec<Weekday> = self
                .store
                .list_days(&primary.username)
                .await?
                .into_iter()
                .map(|d| d.day)
                .collect();
            if !days.is_empty() {
                self.store
                    .replace_days(&alias.username, self.auth_id, &days)
                    .await?;
            }
        }

        tracing::info!(auth_id = self.auth_id, username = %alias.username, "Alias created");
        Ok(alias)
    }

    pub async fn rename_alias(&self, old: &str, new: &str) -> Result<UserAlias> {
        self.owned_alias(old).await?;
        let new = alias_name(new)?;
        if new == old {
            return self.owned_alias(old).await;
        }

        self.store.rename_alias(old, &new).await.map_err(|e| {
            if e.is_conflict() {
                AppError::Conflict(format!("the name {} is already taken", new))
            } else {
                e.into()
            }
        })?;

        tracing::info!(auth_id = self.auth_id, old, new = %new, "Alias renamed");
        Ok(self.store.get_alias(&new).await?)
    }

    /// Delete a non-primary alias with its history.
    pub async fn delete_alias(&self, username: &str) -> Result<()> {
        let alias = self.owned_alias(username).await?;
        if alias.primary {
            return Err(AppError::BadRequest(
                "the primary alias cannot be deleted".to_string(),
            ));
        }

        self.store.delete_alias(username).await?;

        let profile = self.store.get_profile(self.auth_id).await.optional()?;
        if profile.is_some_and(|p| p.buddy_name.as_deref() == Some(username)) {
            self.store
                .update_profile(
                    self.auth_id,
                    &ProfileUpdate {
                        has_buddy: Some(false),
                        buddy_name: Some(None),
                        ..Default::default()
                    },
                )
                .await?;
        }

        tracing::info!(auth_id = self.auth_id, username, "Alias deleted");
        Ok(())
    }

    // ─── Days ────────────────────────────────────────────────────

    pub async fn list_days(&self, username: &str) -> Result<Vec<DayAssignment>> {
        self.owned_alias(username).await?;
        Ok(self.store.list_days(username).await?)
    }

    /// Append a day, subject to the plan's day limit.
    pub async fn add_day(&self, username: &str, day: Weekday) -> Result<DayAssignment> {
        self.owned_alias(username).await?;
        let profile = self.store.get_profile(self.auth_id).await?;
        let days = self.store.list_days(username).await?;

        if days.iter().any(|d| d.day == day) {
            return Err(AppError::Conflict(format!(
                "{} is already a workout day",
                day
            )));
        }
        ensure_day_allowed(profile.subscription_plan, days.len())?;

        let assignment = DayAssignment {
            username: username.to_string(),
            day,
            order: days.iter().map(|d| d.order + 1).max().unwrap_or(0),
            auth_id: self.auth_id.to_string(),
        };
        self.store.insert_day(&assignment).await?;

        tracing::info!(auth_id = self.auth_id, username, %day, "Workout day added");
        Ok(assignment)
    }

    /// Remove a day and its exercises. The last day cannot be removed.
    pub async fn remove_day(&self, username: &str, day: Weekday) -> Result<()> {
        self.owned_alias(username).await?;
        let days = self.store.list_days(username).await?;

        if !days.iter().any(|d| d.day == day) {
            return Err(AppError::NotFound(format!(
                "{} is not a workout day of {}",
                day, username
            )));
        }
        if days.len() <= 1 {
            return Err(AppError::BadRequest(
                "at least one workout day is required".to_string(),
            ));
        }

        self.store.delete_day(username, day).await?;
        tracing::info!(auth_id = self.auth_id, username, %day, "Workout day removed");
        Ok(())
    }

    // ─── Exercises ───────────────────────────────────────────────

    pub async fn list_exercises(
        &self,
        username: &str,
        day: Option<Weekday>,
    ) -> Result<Vec<ExerciseAssignment>> {
        self.owned_alias(username).await?;
        let mut exercises = self.store.list_exercises(username).await?;
        if let Some(day) = day {
            exercises.retain(|e| e.day == day);
        }
        Ok(exercises)
    }

    async fn exercise_names(&self, username: &str, day: Weekday) -> Result<Vec<String>> {
        Ok(self
            .store
            .list_exercises(username)
            .await?
            .into_iter()
            .filter(|e| e.day == day)
            .map(|e| e.name)
            .collect())
    }

    /// Append an exercise to a day the alias trains on.
    pub async fn add_exercise(
        &self,
        username: &str,
        day: Weekday,
        name: &str,
    ) -> Result<Vec<ExerciseAssignment>> {
        self.owned_alias(username).await?;
        let name = validate_exercise_name(name)?;

        let days = self.store.list_days(username).await?;
        if !days.iter().any(|d| d.day == day) {
            return Err(AppError::BadRequest(format!(
                "{} is not a workout day of {}",
                day, username
            )));
        }

        let mut names = self.exercise_names(username, day).await?;
        if names.contains(&name) {
            return Err(AppError::Conflict(format!(
                "{} is already on {}",
                name, day
            )));
        }
        names.push(name);
        Ok(self.store.replace_exercises(username, day, &names).await?)
    }

    /// Move the exercise at `from` so it ends up at `to`.
    pub async fn move_exercise(
        &self,
        username: &str,
        day: Weekday,
        from: u32,
        to: u32,
    ) -> Result<Vec<ExerciseAssignment>> {
        self.owned_alias(username).await?;
        let mut names = self.exercise_names(username, day).await?;

        let (from, to) = (from as usize, to as usize);
        if from >= names.len() || to >= names.len() {
            return Err(AppError::BadRequest(format!(
                "position out of range (have {} exercises)",
                names.len()
            )));
        }
        let name = names.remove(from);
        names.insert(to, name);
        Ok(self.store.replace_exercises(username, day, &names).await?)
    }

    /// Remove one exercise; later positions shift down.
    pub async fn remove_exercise(
        &self,
        username: &str,
        day: Weekday,
        position: u32,
    ) -> Result<Vec<ExerciseAssignment>> {
        self.owned_alias(username).await?;
        let mut names = self.exercise_names(username, day).await?;

        let position = position as usize;
        if position >= names.len() {
            return Err(AppError::NotFound(format!(
                "no exercise at position {} on {}",
                position, day
            )));
        }
        names.remove(position);
        Ok(self.store.replace_exercises(username, day, &names).await?)
    }

    // ─── Set log ─────────────────────────────────────────────────

    pub async fn list_sets(
        &self,
        username: &str,
        exercise: Option<&str>,
    ) -> Result<Vec<SetLogEntry>> {
        self.owned_alias(username).await?;
        Ok(self.store.list_sets(username, exercise).await?)
    }

    pub async fn add_set(&self, username: &str, exercise: &str, set: NewSet) -> Result<SetLogEntry> {
        self.owned_alias(username).await?;
        let exercise = validate_exercise_name(exercise)?;
        set.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let entry = SetLogEntry::new(username, &exercise, set);
        self.store.insert_set(&entry).await?;
        tracing::debug!(username, exercise = %entry.exercise, id = %entry.id, "Set logged");
        Ok(entry)
    }

    pub async fn delete_set(&self, id: &str) -> Result<SetLogEntry> {
        let entry = self.store.get_set(id).await?;
        self.owned_alias(&entry.username).await?;
        self.store.delete_set(id).await?;
        Ok(entry)
    }

    pub async fn clear_sets(&self, username: &str) -> Result<usize> {
        self.owned_alias(username).await?;
        let removed = self.store.delete_sets_for_alias(username).await?;
        tracing::info!(auth_id = self.auth_id, username, removed, "Set history cleared");
        Ok(removed)
    }
}
