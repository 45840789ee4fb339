// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing [`Store`].
//!
//! Document layout:
//! - `profiles/{identity}`
//! - `users/{username}` (document ID enforces alias uniqueness)
//! - `user_days/{username}_{day}`
//! - `exercises/{username}_{day}_{position}`
//! - `workout_sets/{uuid}`
//!
//! Usernames are URL-encoded inside document IDs. Multi-document writes
//! (day/exercise replacement, rename, deletes) go through transactions.

use super::{
    collections, ChangeEvent, ChangeFeed, ChangeOp, Store, StoreError, StoreResult, Table,
};
use crate::models::{
    DayAssignment, ExerciseAssignment, Profile, ProfileUpdate, SetLogEntry, UserAlias, Weekday,
};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use serde::{de::DeserializeOwned, Serialize};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    feed: ChangeFeed,
}

/// Map a Firestore error onto the storage error kinds.
fn classify(context: &str, err: FirestoreError) -> StoreError {
    let message = format!("{}: {}", context, err);
    match err {
        FirestoreError::DataNotFoundError(_) => StoreError::not_found(message),
        FirestoreError::DataConflictError(_) => StoreError::conflict(message),
        FirestoreError::NetworkError(_) => StoreError::transient(message),
        FirestoreError::DatabaseError(ref e) if e.retry_possible => StoreError::transient(message),
        _ => StoreError::fatal(message),
    }
}

fn alias_doc_id(username: &str) -> String {
    urlencoding::encode(username).into_owned()
}

fn day_doc_id(username: &str, day: Weekday) -> String {
    format!("{}_{}", alias_doc_id(username), day)
}

fn exercise_doc_id(username: &str, day: Weekday, position: u32) -> String {
    format!("{}_{}_{}", alias_doc_id(username), day, position)
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> StoreResult<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| classify("Failed to connect to Firestore", e))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            feed: ChangeFeed::new(),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> StoreResult<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| classify("Failed to connect to Firestore Emulator", e))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            feed: ChangeFeed::new(),
        })
    }

    /// Create an offline client. Every operation fails with `Fatal`.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            feed: ChangeFeed::new(),
        }
    }

    fn get_client(&self) -> StoreResult<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::fatal("Database not connected (offline mode)"))
    }

    // ─── Helper Methods ────────────────────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> StoreResult<T>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| classify(collection, e))?
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", collection, id)))
    }

    /// Create a document; `Conflict` if the ID is taken.
    async fn create_doc<T>(&self, collection: &str, id: &str, obj: &T) -> StoreResult<()>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let _: T = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(id)
            .object(obj)
            .execute()
            .await
            .map_err(|e| classify(collection, e))?;
        Ok(())
    }

    async fn upsert_doc<T>(&self, collection: &str, id: &str, obj: &T) -> StoreResult<()>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let _: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(obj)
            .execute()
            .await
            .map_err(|e| classify(collection, e))?;
        Ok(())
    }

    async fn query_eq<T>(&self, collection: &str, field: &str, value: &str) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| q.for_all([q.field(field).eq(value)]))
            .obj()
            .query()
            .await
            .map_err(|e| classify(collection, e))
    }

    /// Batch delete documents using transactions.
    async fn batch_delete(&self, collection: &str, ids: &[String]) -> StoreResult<()> {
        let client = self.get_client()?;

        for chunk in ids.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| classify("Failed to begin transaction", e))?;

            for doc_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| classify(collection, e))?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| classify("Failed to commit batch deletion", e))?;
        }

        Ok(())
    }

    /// Rewrite a batch of set entries under a new username.
    async fn batch_upsert_sets(&self, sets: &[SetLogEntry]) -> StoreResult<()> {
        let client = self.get_client()?;

        for chunk in sets.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| classify("Failed to begin transaction", e))?;

            for set in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::WORKOUT_SETS)
                    .document_id(&set.id)
                    .object(set)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| classify(collections::WORKOUT_SETS, e))?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| classify("Failed to commit set rewrite", e))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }

    // ─── Profile Operations ──────────────────────────────────────

    async fn get_profile(&self, id: &str) -> StoreResult<Profile> {
        self.get_doc(collections::PROFILES, id).await
    }

    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        self.create_doc(collections::PROFILES, &profile.id, profile)
            .await?;
        self.feed
            .publish(ChangeEvent::new(Table::Profiles, ChangeOp::Insert).for_identity(&profile.id));
        Ok(())
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<Profile> {
        // Fetch-modify-write; concurrent updates are last-write-wins.
        let mut profile: Profile = self.get_doc(collections::PROFILES, id).await?;
        update.apply(&mut profile);
        self.upsert_doc(collections::PROFILES, id, &profile).await?;
        self.feed
            .publish(ChangeEvent::new(Table::Profiles, ChangeOp::Update).for_identity(id));
        Ok(profile)
    }

    // ─── Alias Operations ────────────────────────────────────────

    async fn get_alias(&self, username: &str) -> StoreResult<UserAlias> {
        self.get_doc(collections::USERS, &alias_doc_id(username))
            .await
    }

    async fn get_primary_alias(&self, auth_id: &str) -> StoreResult<UserAlias> {
        let mut aliases: Vec<UserAlias> =
            self.query_eq(collections::USERS, "auth_id", auth_id).await?;
        aliases.retain(|a| a.primary);
        aliases.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        aliases
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(format!("primary alias for {}", auth_id)))
    }

    async fn list_aliases(&self, auth_id: &str) -> StoreResult<Vec<UserAlias>> {
        let mut aliases: Vec<UserAlias> =
            self.query_eq(collections::USERS, "auth_id", auth_id).await?;
        aliases.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(aliases)
    }

    async fn insert_alias(&self, alias: &UserAlias) -> StoreResult<()> {
        self.create_doc(collections::USERS, &alias_doc_id(&alias.username), alias)
            .await?;
        self.feed.publish(
            ChangeEvent::new(Table::Users, ChangeOp::Insert)
                .for_alias(&alias.username)
                .for_identity(&alias.auth_id),
        );
        Ok(())
    }

    /// The alias, its days and exercises, and profile references move in
    /// one transaction. The new alias document is written with an
    /// `exists: false` precondition, so a concurrent claim of `new` fails
    /// the commit instead of being overwritten. Set logs are rewritten
    /// after the commit in batches of `BATCH_SIZE` and are not atomic with
    /// the rest; a failure there leaves some sets under the old name.
    async fn rename_alias(&self, old: &str, new: &str) -> StoreResult<()> {
        let alias = self.get_alias(old).await?;
        if self.get_alias(new).await.is_ok() {
            return Err(StoreError::conflict(format!("alias {} already exists", new)));
        }

        let days = self.list_days(old).await?;
        let exercises = self.list_exercises(old).await?;
        let sets = self.list_sets(old, None).await?;
        let profile = self.get_profile(&alias.auth_id).await.ok();

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| classify("Failed to begin transaction", e))?;

        let renamed = UserAlias {
            username: new.to_string(),
            ..alias.clone()
        };
        client
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(alias_doc_id(old))
            .add_to_transaction(&mut transaction)
            .map_err(|e| classify(collections::USERS, e))?;
        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(firestore::FirestoreWritePrecondition::Exists(false))
            .document_id(alias_doc_id(new))
            .object(&renamed)
            .add_to_transaction(&mut transaction)
            .map_err(|e| classify(collections::USERS, e))?;

        for day in &days {
            let moved = DayAssignment {
                username: new.to_string(),
                ..day.clone()
            };
            client
                .fluent()
                .delete()
                .from(collections::USER_DAYS)
                .document_id(day_doc_id(old, day.day))
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::USER_DAYS, e))?;
            client
                .fluent()
                .update()
                .in_col(collections::USER_DAYS)
                .document_id(day_doc_id(new, day.day))
                .object(&moved)
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::USER_DAYS, e))?;
        }

        for exercise in &exercises {
            let moved = ExerciseAssignment {
                username: new.to_string(),
                ..exercise.clone()
            };
            client
                .fluent()
                .delete()
                .from(collections::EXERCISES)
                .document_id(exercise_doc_id(old, exercise.day, exercise.position))
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::EXERCISES, e))?;
            client
                .fluent()
                .update()
                .in_col(collections::EXERCISES)
                .document_id(exercise_doc_id(new, exercise.day, exercise.position))
                .object(&moved)
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::EXERCISES, e))?;
        }

        if let Some(mut profile) = profile {
            let mut touched = false;
            if alias.primary && profile.display_name == old {
                profile.display_name = new.to_string();
                touched = true;
            }
            if profile.buddy_name.as_deref() == Some(old) {
                profile.buddy_name = Some(new.to_string());
                touched = true;
            }
            if touched {
                client
                    .fluent()
                    .update()
                    .in_col(collections::PROFILES)
                    .document_id(&profile.id)
                    .object(&profile)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| classify(collections::PROFILES, e))?;
            }
        }

        if let Err(e) = transaction.commit().await {
            let err = classify("Rename commit failed", e);
            // A failed precondition does not come back as a conflict; check
            // whether someone else claimed the name meanwhile.
            if !err.is_conflict() && self.get_alias(new).await.is_ok() {
                tracing::warn!(old, new, "Alias name claimed during rename");
                return Err(StoreError::conflict(format!("alias {} already exists", new)));
            }
            return Err(err);
        }

        // Set history can exceed one transaction; it follows in batches.
        let moved_sets: Vec<SetLogEntry> = sets
            .into_iter()
            .map(|s| SetLogEntry {
                username: new.to_string(),
                ..s
            })
            .collect();
        self.batch_upsert_sets(&moved_sets).await?;

        tracing::info!(
            old,
            new,
            days = days.len(),
            exercises = exercises.len(),
            sets = moved_sets.len(),
            "Alias renamed"
        );

        for table in [Table::Users, Table::UserDays, Table::Exercises, Table::WorkoutSets] {
            self.feed
                .publish(ChangeEvent::new(table, ChangeOp::Update).for_identity(&alias.auth_id));
        }
        self.feed.publish(
            ChangeEvent::new(Table::Profiles, ChangeOp::Update).for_identity(&alias.auth_id),
        );
        Ok(())
    }

    async fn delete_alias(&self, username: &str) -> StoreResult<()> {
        let alias = self.get_alias(username).await?;

        let sets = self.list_sets(username, None).await?;
        let set_ids: Vec<String> = sets.into_iter().map(|s| s.id).collect();
        self.batch_delete(collections::WORKOUT_SETS, &set_ids).await?;

        let exercise_ids: Vec<String> = self
            .list_exercises(username)
            .await?
            .iter()
            .map(|e| exercise_doc_id(username, e.day, e.position))
            .collect();
        self.batch_delete(collections::EXERCISES, &exercise_ids)
            .await?;

        let day_ids: Vec<String> = self
            .list_days(username)
            .await?
            .iter()
            .map(|d| day_doc_id(username, d.day))
            .collect();
        self.batch_delete(collections::USER_DAYS, &day_ids).await?;

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(alias_doc_id(username))
            .execute()
            .await
            .map_err(|e| classify(collections::USERS, e))?;

        tracing::info!(
            username,
            sets = set_ids.len(),
            exercises = exercise_ids.len(),
            days = day_ids.len(),
            "Alias deleted"
        );

        for table in [Table::Users, Table::UserDays, Table::Exercises, Table::WorkoutSets] {
            self.feed.publish(
                ChangeEvent::new(table, ChangeOp::Delete)
                    .for_alias(username)
                    .for_identity(&alias.auth_id),
            );
        }
        Ok(())
    }

    // ─── Workout Day Operations ──────────────────────────────────

    async fn list_days(&self, username: &str) -> StoreResult<Vec<DayAssignment>> {
        let mut days: Vec<DayAssignment> =
            self.query_eq(collections::USER_DAYS, "username", username).await?;
        days.sort_by_key(|d| d.order);
        Ok(days)
    }

    async fn insert_day(&self, day: &DayAssignment) -> StoreResult<()> {
        self.create_doc(
            collections::USER_DAYS,
            &day_doc_id(&day.username, day.day),
            day,
        )
        .await?;
        self.feed.publish(
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
        let existing = self.list_days(username).await?;
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

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| classify("Failed to begin transaction", e))?;

        // Document IDs are per (alias, day): overwrite kept days, delete the rest.
        for old in existing.iter().filter(|d| !days.contains(&d.day)) {
            client
                .fluent()
                .delete()
                .from(collections::USER_DAYS)
                .document_id(day_doc_id(username, old.day))
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::USER_DAYS, e))?;
        }
        for assignment in &assignments {
            client
                .fluent()
                .update()
                .in_col(collections::USER_DAYS)
                .document_id(day_doc_id(username, assignment.day))
                .object(assignment)
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::USER_DAYS, e))?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| classify("Day replacement commit failed", e))?;

        self.feed.publish(
            ChangeEvent::new(Table::UserDays, ChangeOp::Update)
                .for_alias(username)
                .for_identity(auth_id),
        );
        Ok(assignments)
    }

    async fn delete_day(&self, username: &str, day: Weekday) -> StoreResult<()> {
        let _: DayAssignment = self
            .get_doc(collections::USER_DAYS, &day_doc_id(username, day))
            .await?;

        let exercise_ids: Vec<String> = self
            .list_exercises(username)
            .await?
            .iter()
            .filter(|e| e.day == day)
            .map(|e| exercise_doc_id(username, e.day, e.position))
            .collect();

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| classify("Failed to begin transaction", e))?;

        client
            .fluent()
            .delete()
            .from(collections::USER_DAYS)
            .document_id(day_doc_id(username, day))
            .add_to_transaction(&mut transaction)
            .map_err(|e| classify(collections::USER_DAYS, e))?;
        for doc_id in &exercise_ids {
            client
                .fluent()
                .delete()
                .from(collections::EXERCISES)
                .document_id(doc_id)
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::EXERCISES, e))?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| classify("Day deletion commit failed", e))?;

        self.feed
            .publish(ChangeEvent::new(Table::UserDays, ChangeOp::Delete).for_alias(username));
        self.feed
            .publish(ChangeEvent::new(Table::Exercises, ChangeOp::Delete).for_alias(username));
        Ok(())
    }

    // ─── Exercise Operations ─────────────────────────────────────

    async fn list_exercises(&self, username: &str) -> StoreResult<Vec<ExerciseAssignment>> {
        let mut exercises: Vec<ExerciseAssignment> =
            self.query_eq(collections::EXERCISES, "username", username).await?;
        exercises.sort_by_key(|e| (e.day, e.position));
        Ok(exercises)
    }

    async fn replace_exercises(
        &self,
        username: &str,
        day: Weekday,
        names: &[String],
    ) -> StoreResult<Vec<ExerciseAssignment>> {
        let existing: Vec<ExerciseAssignment> = self
            .list_exercises(username)
            .await?
            .into_iter()
            .filter(|e| e.day == day)
            .collect();
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

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| classify("Failed to begin transaction", e))?;

        for old in existing
            .iter()
            .filter(|e| e.position as usize >= assignments.len())
        {
            client
                .fluent()
                .delete()
                .from(collections::EXERCISES)
                .document_id(exercise_doc_id(username, day, old.position))
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::EXERCISES, e))?;
        }
        for assignment in &assignments {
            client
                .fluent()
                .update()
                .in_col(collections::EXERCISES)
                .document_id(exercise_doc_id(username, day, assignment.position))
                .object(assignment)
                .add_to_transaction(&mut transaction)
                .map_err(|e| classify(collections::EXERCISES, e))?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| classify("Exercise rewrite commit failed", e))?;

        self.feed
            .publish(ChangeEvent::new(Table::Exercises, ChangeOp::Update).for_alias(username));
        Ok(assignments)
    }

    // ─── Set Log Operations ──────────────────────────────────────

    async fn insert_set(&self, entry: &SetLogEntry) -> StoreResult<()> {
        self.create_doc(collections::WORKOUT_SETS, &entry.id, entry)
            .await?;
        self.feed.publish(
            ChangeEvent::new(Table::WorkoutSets, ChangeOp::Insert).for_alias(&entry.username),
        );
        Ok(())
    }

    async fn get_set(&self, id: &str) -> StoreResult<SetLogEntry> {
        self.get_doc(collections::WORKOUT_SETS, id).await
    }

    async fn list_sets(
        &self,
        username: &str,
        exercise: Option<&str>,
    ) -> StoreResult<Vec<SetLogEntry>> {
        let mut sets: Vec<SetLogEntry> =
            self.query_eq(collections::WORKOUT_SETS, "username", username).await?;
        if let Some(name) = exercise {
            sets.retain(|s| s.exercise == name);
        }
        sets.sort_by_key(|s| s.created_at);
        Ok(sets)
    }

    async fn delete_set(&self, id: &str) -> StoreResult<()> {
        let entry = self.get_set(id).await?;
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::WORKOUT_SETS)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| classify(collections::WORKOUT_SETS, e))?;
        self.feed.publish(
            ChangeEvent::new(Table::WorkoutSets, ChangeOp::Delete).for_alias(&entry.username),
        );
        Ok(())
    }

    async fn delete_sets_for_alias(&self, username: &str) -> StoreResult<usize> {
        let ids: Vec<String> = self
            .list_sets(username, None)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        self.batch_delete(collections::WORKOUT_SETS, &ids).await?;
        tracing::debug!(username, count = ids.len(), "Cleared set history");
        self.feed
            .publish(ChangeEvent::new(Table::WorkoutSets, ChangeOp::Delete).for_alias(username));
        Ok(ids.len())
    }
}
