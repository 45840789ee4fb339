//! Storage access layer.
//!
//! Every backend implements [`Store`] and classifies its failures into a
//! [`StoreErrorKind`] once, at the boundary. Callers match on the kind and
//! never inspect backend error codes themselves. Every committed write is
//! published on the backend's [`ChangeFeed`].

pub mod changes;
pub mod firestore;
pub mod memory;

pub use changes::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeOp, LiveFlag, Subscription, Table};
pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::models::{
    DayAssignment, ExerciseAssignment, Profile, ProfileUpdate, SetLogEntry, UserAlias, Weekday,
};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const USERS: &str = "users";
    pub const USER_DAYS: &str = "user_days";
    pub const EXERCISES: &str = "exercises";
    pub const WORKOUT_SETS: &str = "workout_sets";
}

/// Classification of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The row does not exist. Expected; callers usually create it.
    NotFound,
    /// A uniqueness constraint was violated.
    Conflict,
    /// Network or backend hiccup; the operation may succeed if retried.
    Transient,
    /// Anything else.
    Fatal,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Conflict, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Fatal, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == StoreErrorKind::Conflict
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Turn a `NotFound` into `Ok(None)`.
pub trait StoreResultExt<T> {
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Storage operations used by the services.
#[async_trait]
pub trait Store: Send + Sync {
    /// Change notifications for writes committed through this store.
    fn changes(&self) -> &ChangeFeed;

    // ─── Profiles ────────────────────────────────────────────────

    async fn get_profile(&self, id: &str) -> StoreResult<Profile>;

    /// Create a profile. `Conflict` if one already exists for the id.
    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()>;

    /// Apply a partial update and return the new profile.
    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<Profile>;

    // ─── Aliases ─────────────────────────────────────────────────

    async fn get_alias(&self, username: &str) -> StoreResult<UserAlias>;

    /// The primary alias owned by `auth_id`.
    async fn get_primary_alias(&self, auth_id: &str) -> StoreResult<UserAlias>;

    /// All aliases owned by `auth_id`, sorted by username.
    async fn list_aliases(&self, auth_id: &str) -> StoreResult<Vec<UserAlias>>;

    /// Create an alias. `Conflict` if the username is taken.
    async fn insert_alias(&self, alias: &UserAlias) -> StoreResult<()>;

    /// Rename an alias and every row that references it. Profile
    /// display/buddy names that pointed at the old name follow.
    /// `Conflict` if `new` is taken, including by a write that lands while
    /// the rename is in progress.
    async fn rename_alias(&self, old: &str, new: &str) -> StoreResult<()>;

    /// Delete an alias with its days, exercises and set history.
    async fn delete_alias(&self, username: &str) -> StoreResult<()>;

    // ─── Workout days ────────────────────────────────────────────

    /// Day assignments for an alias, sorted by `order`.
    async fn list_days(&self, username: &str) -> StoreResult<Vec<DayAssignment>>;

    /// Add one day. `Conflict` if the alias already has it.
    async fn insert_day(&self, day: &DayAssignment) -> StoreResult<()>;

    /// Replace all day assignments of an alias with `days`, `order = index`.
    async fn replace_days(
        &self,
        username: &str,
        auth_id: &str,
        days: &[Weekday],
    ) -> StoreResult<Vec<DayAssignment>>;

    /// Remove one day and the alias's exercises on it.
    async fn delete_day(&self, username: &str, day: Weekday) -> StoreResult<()>;

    // ─── Exercises ───────────────────────────────────────────────

    /// All exercise assignments of an alias, by weekday then position.
    async fn list_exercises(&self, username: &str) -> StoreResult<Vec<ExerciseAssignment>>;

    /// Rewrite the exercise list for (alias, day) with positions `0..n`.
    async fn replace_exercises(
        &self,
        username: &str,
        day: Weekday,
        names: &[String],
    ) -> StoreResult<Vec<ExerciseAssignment>>;

    // ─── Set log ─────────────────────────────────────────────────

    async fn insert_set(&self, entry: &SetLogEntry) -> StoreResult<()>;

    async fn get_set(&self, id: &str) -> StoreResult<SetLogEntry>;

    /// Sets for an alias, optionally for one exercise, oldest first.
    async fn list_sets(&self, username: &str, exercise: Option<&str>)
        -> StoreResult<Vec<SetLogEntry>>;

    async fn delete_set(&self, id: &str) -> StoreResult<()>;

    /// Clear an alias's history. Returns the number of sets removed.
    async fn delete_sets_for_alias(&self, username: &str) -> StoreResult<usize>;
}
