// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Interactive onboarding.
//!
//! [`SetupFlow`] is the per-identity state machine
//! (display name → buddy → template → days → complete). It is pure;
//! [`SetupService`] validates each submission, persists it, and only then
//! advances the flow, so a failed write leaves the user on the same step.

use crate::db::{Store, StoreError, StoreResultExt};
use crate::error::AppError;
use crate::models::schedule::template_exercises;
use crate::models::{
    DayAssignment, Profile, ProfileUpdate, TemplatePreference, UserAlias, Weekday,
};
use crate::services::bootstrap::{claim_alias, BootstrapFailure};
use crate::services::retry::AttemptError;
use serde::Serialize;
use std::collections::HashSet;

/// Longest accepted display or buddy name, in characters.
pub const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    DisplayName,
    Buddy,
    Template,
    Days,
    Complete,
}

impl SetupStep {
    fn next(self) -> Self {
        match self {
            Self::DisplayName => Self::Buddy,
            Self::Buddy => Self::Template,
            Self::Template => Self::Days,
            Self::Days | Self::Complete => Self::Complete,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            Self::DisplayName | Self::Complete => None,
            Self::Buddy => Some(Self::DisplayName),
            Self::Template => Some(Self::Buddy),
            Self::Days => Some(Self::Template),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("expected the {expected:?} step, got {got:?}")]
    WrongStep { expected: SetupStep, got: SetupStep },

    #[error("no step before {0:?}")]
    NoPreviousStep(SetupStep),

    #[error("setup must be completed before it can be closed")]
    CancelForbidden,

    #[error("{0}")]
    Invalid(String),

    #[error("the name {0:?} is already taken")]
    NameTaken(String),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapFailure),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AttemptError<BootstrapFailure>> for SetupError {
    fn from(err: AttemptError<BootstrapFailure>) -> Self {
        match err {
            AttemptError::Store(e) => SetupError::Store(e),
            AttemptError::Terminal(f) => SetupError::Bootstrap(f),
        }
    }
}

impl From<SetupError> for AppError {
    fn from(err: SetupError) -> Self {
        match err {
            SetupError::WrongStep { .. } | SetupError::NameTaken(_) => {
                AppError::Conflict(err.to_string())
            }
            SetupError::Bootstrap(BootstrapFailure::AliasUnavailable { .. }) => {
                AppError::Conflict(err.to_string())
            }
            SetupError::Bootstrap(BootstrapFailure::StepFailed { source, .. }) => source.into(),
            SetupError::NoPreviousStep(_) | SetupError::Invalid(_) => {
                AppError::BadRequest(err.to_string())
            }
            SetupError::CancelForbidden => AppError::Forbidden(err.to_string()),
            SetupError::Store(e) => e.into(),
        }
    }
}

/// Onboarding state for one identity.
#[derive(Debug, Clone, Serialize)]
pub struct SetupFlow {
    #[serde(skip)]
    pub auth_id: String,
    /// Forced flows cannot be dismissed before completion.
    pub forced: bool,
    pub step: SetupStep,
    pub display_name: Option<String>,
    pub has_buddy: bool,
    pub buddy_name: Option<String>,
    pub template: Option<TemplatePreference>,
    pub days: Vec<Weekday>,
}

impl SetupFlow {
    pub fn new(auth_id: &str, forced: bool) -> Self {
        Self {
            auth_id: auth_id.to_string(),
            forced,
            step: SetupStep::DisplayName,
            display_name: None,
            has_buddy: false,
            buddy_name: None,
            template: None,
            days: Vec::new(),
        }
    }

    /// Pre-fill answers from an existing profile.
    pub fn with_profile(mut self, profile: &Profile) -> Self {
        if !profile.display_name.trim().is_empty() {
            self.display_name = Some(profile.display_name.clone());
        }
        self.has_buddy = profile.has_buddy;
        self.buddy_name = profile.buddy_name.clone();
        self.template = profile.template_preference;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.step == SetupStep::Complete
    }

    pub fn expect_step(&self, step: SetupStep) -> Result<(), SetupError> {
        if self.step == step {
            Ok(())
        } else {
            Err(SetupError::WrongStep {
                expected: self.step,
                got: step,
            })
        }
    }

    fn advance(&mut self) {
        self.step = self.step.next();
    }

    /// Go back one step. Answers already given are kept.
    pub fn back(&mut self) -> Result<SetupStep, SetupError> {
        let previous = self
            .step
            .previous()
            .ok_or(SetupError::NoPreviousStep(self.step))?;
        self.step = previous;
        Ok(previous)
    }

    pub fn cancel(&self) -> Result<(), SetupError> {
        if self.forced && !self.is_complete() {
            return Err(SetupError::CancelForbidden);
        }
        Ok(())
    }
}

// ─── Validation ──────────────────────────────────────────────────

fn validate_name(field: &str, value: &str) -> Result<String, SetupError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SetupError::Invalid(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(SetupError::Invalid(format!(
            "{} must be at most {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_display_name(name: &str) -> Result<String, SetupError> {
    validate_name("display name", name)
}

/// A buddy needs a name; without a buddy any name is dropped.
pub fn validate_buddy(has_buddy: bool, name: Option<&str>) -> Result<Option<String>, SetupError> {
    if !has_buddy {
        return Ok(None);
    }
    validate_name("buddy name", name.unwrap_or_default()).map(Some)
}

/// Non-empty, no duplicates. Order is preserved.
pub fn validate_days(days: &[Weekday]) -> Result<Vec<Weekday>, SetupError> {
    if days.is_empty() {
        return Err(SetupError::Invalid(
            "select at least one workout day".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for day in days {
        if !seen.insert(*day) {
            return Err(SetupError::Invalid(format!("{} selected twice", day)));
        }
    }
    Ok(days.to_vec())
}

// ─── Persistence ─────────────────────────────────────────────────

/// Result of the final setup step.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeReport {
    pub username: String,
    pub buddy: Option<String>,
    pub days: Vec<DayAssignment>,
    pub seeded_days: Vec<Weekday>,
}

pub struct SetupService<'a> {
    store: &'a dyn Store,
}

impl<'a> SetupService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Open a flow pre-filled from the stored profile, if any.
    pub async fn start(&self, auth_id: &str, forced: bool) -> Result<SetupFlow, SetupError> {
        let flow = SetupFlow::new(auth_id, forced);
        Ok(match self.store.get_profile(auth_id).await.optional()? {
            Some(profile) => flow.with_profile(&profile),
            None => flow,
        })
    }

    pub async fn submit_display_name(
        &self,
        flow: &mut SetupFlow,
        name: &str,
    ) -> Result<(), SetupError> {
        flow.expect_step(SetupStep::DisplayName)?;
        let name = validate_display_name(name)?;

        // The alias goes first so a taken name leaves the profile untouched.
        match self.store.get_primary_alias(&flow.auth_id).await.optional()? {
            Some(alias) if alias.username == name => {}
            Some(alias) => match self.store.rename_alias(&alias.username, &name).await {
                Err(e) if e.is_conflict() => return Err(SetupError::NameTaken(name)),
                other => other?,
            },
            None => {
                let alias = UserAlias::primary(&name, &flow.auth_id);
                match self.store.insert_alias(&alias).await {
                    Err(e) if e.is_conflict() => return Err(SetupError::NameTaken(name)),
                    other => other?,
                }
            }
        }

        self.update_or_create_profile(
            &flow.auth_id,
            &name,
            ProfileUpdate {
                display_name: Some(name.clone()),
                ..Default::default()
            },
        )
        .await?;

        tracing::info!(auth_id = %flow.auth_id, display_name = %name, "Setup: display name saved");
        flow.display_name = Some(name);
        flow.advance();
        Ok(())
    }

    pub async fn submit_buddy(
        &self,
        flow: &mut SetupFlow,
        has_buddy: bool,
        buddy_name: Option<&str>,
    ) -> Result<(), SetupError> {
        flow.expect_step(SetupStep::Buddy)?;
        let buddy_name = validate_buddy(has_buddy, buddy_name)?;

        self.store
            .update_profile(
                &flow.auth_id,
                &ProfileUpdate {
                    has_buddy: Some(has_buddy),
                    buddy_name: Some(buddy_name.clone()),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(auth_id = %flow.auth_id, has_buddy, "Setup: buddy choice saved");
        flow.has_buddy = has_buddy;
        flow.buddy_name = buddy_name;
        flow.advance();
        Ok(())
    }

    pub async fn submit_template(
        &self,
        flow: &mut SetupFlow,
        template: TemplatePreference,
    ) -> Result<(), SetupError> {
        flow.expect_step(SetupStep::Template)?;

        self.store
            .update_profile(
                &flow.auth_id,
                &ProfileUpdate {
                    template_preference: Some(Some(template)),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(auth_id = %flow.auth_id, ?template, "Setup: template choice saved");
        flow.template = Some(template);
        flow.advance();
        Ok(())
    }

    pub async fn submit_days(
        &self,
        flow: &mut SetupFlow,
        days: &[Weekday],
    ) -> Result<FinalizeReport, SetupError> {
        flow.expect_step(SetupStep::Days)?;
        let days = validate_days(days)?;

        let buddy = flow
            .buddy_name
            .as_deref()
            .filter(|_| flow.has_buddy);
        let report = self
            .finalize_days(&flow.auth_id, &days, buddy, flow.template)
            .await?;

        flow.days = days;
        flow.buddy_name = report.buddy.clone().or(flow.buddy_name.take());
        flow.advance();
        Ok(report)
    }

    /// Write the day selection for the primary alias and the buddy.
    ///
    /// Days are replaced wholesale (last write wins). The buddy alias is
    /// created on first use under the caller's identity; if its name is
    /// taken by someone else a suffixed name is used and written back to
    /// the profile.
    pub async fn finalize_days(
        &self,
        auth_id: &str,
        days: &[Weekday],
        buddy_name: Option<&str>,
        template: Option<TemplatePreference>,
    ) -> Result<FinalizeReport, SetupError> {
        let profile = self.store.get_profile(auth_id).await?;

        let primary = match self.store.get_primary_alias(auth_id).await.optional()? {
            Some(alias) => alias,
            None => claim_alias(self.store, &profile.display_name, auth_id, true).await?.0,
        };
        let assignments = self
            .store
            .replace_days(&primary.username, auth_id, days)
            .await?;

        let mut aliases = vec![primary.username.clone()];
        let mut buddy = None;
        if let Some(name) = buddy_name {
            let (alias, created) = claim_alias(self.store, name, auth_id, false).await?;
            if alias.username != name {
                tracing::info!(requested = name, resolved = %alias.username, "Buddy name was taken");
            }
            if profile.buddy_name.as_deref() != Some(alias.username.as_str()) {
                self.store
                    .update_profile(
                        auth_id,
                        &ProfileUpdate {
                            has_buddy: Some(true),
                            buddy_name: Some(Some(alias.username.clone())),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            self.store
                .replace_days(&alias.username, auth_id, days)
                .await?;
            tracing::debug!(buddy = %alias.username, created, "Buddy days mirrored");
            aliases.push(alias.username.clone());
            buddy = Some(alias.username);
        }

        let mut seeded_days = Vec::new();
        if template == Some(TemplatePreference::Template) {
            for username in &aliases {
                for day in self.seed_template(username, days).await? {
                    if !seeded_days.contains(&day) {
                        seeded_days.push(day);
                    }
                }
            }
        }

        tracing::info!(
            auth_id,
            username = %primary.username,
            buddy = buddy.as_deref(),
            days = days.len(),
            seeded = seeded_days.len(),
            "Setup: workout days saved"
        );

        Ok(FinalizeReport {
            username: primary.username,
            buddy,
            days: assignments,
            seeded_days,
        })
    }

    /// Fill template exercises into selected days that have none yet.
    async fn seed_template(
        &self,
        username: &str,
        days: &[Weekday],
    ) -> Result<Vec<Weekday>, SetupError> {
        let existing = self.store.list_exercises(username).await?;
        let mut seeded = Vec::new();
        for day in days {
            let names = template_exercises(*day);
            if names.is_empty() || existing.iter().any(|e| e.day == *day) {
                continue;
            }
            let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
            self.store.replace_exercises(username, *day, &names).await?;
            seeded.push(*day);
        }
        Ok(seeded)
    }

    async fn update_or_create_profile(
        &self,
        auth_id: &str,
        display_name: &str,
        update: ProfileUpdate,
    ) -> Result<Profile, SetupError> {
        match self.store.update_profile(auth_id, &update).await {
            Err(e) if e.is_not_found() => {
                let profile = Profile::new(auth_id, display_name);
                match self.store.insert_profile(&profile).await {
                    Err(e) if e.is_conflict() => {}
                    other => other?,
                }
                Ok(self.store.update_profile(auth_id, &update).await?)
            }
            other => Ok(other?),
        }
    }
}
