// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Logged sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One logged set. Values are stored as entered ("60kg", "8-10", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SetLogEntry {
    /// Document ID
    pub id: String,
    pub username: String,
    pub exercise: String,
    pub warmup: String,
    pub weight: String,
    pub reps: String,
    pub goal: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

/// Set values as submitted by the client.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSet {
    #[validate(length(max = 50))]
    #[serde(default)]
    pub warmup: String,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub weight: String,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub reps: String,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub goal: String,
}

impl SetLogEntry {
    pub fn new(username: &str, exercise: &str, set: NewSet) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            exercise: exercise.to_string(),
            warmup: set.warmup,
            weight: set.weight,
            reps: set.reps,
            goal: set.goal,
            created_at: Utc::now(),
        }
    }
}
