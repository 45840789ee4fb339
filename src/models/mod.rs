// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod alias;
pub mod profile;
pub mod schedule;
pub mod set_log;

pub use alias::UserAlias;
pub use profile::{Profile, ProfileUpdate, SubscriptionPlan, TemplatePreference};
pub use schedule::{DayAssignment, ExerciseAssignment, Weekday};
pub use set_log::{NewSet, SetLogEntry};
