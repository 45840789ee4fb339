// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account bootstrap: make sure a freshly signed-in identity has a profile
//! and a primary alias.
//!
//! Runs on every sign-in and is idempotent. Each step reads first and only
//! creates what is missing:
//!
//! 1. Profile: created with the resolved display name and no template
//!    preference. Losing an insert race to a concurrent sign-in is success.
//! 2. Primary alias: the display name, or the first free of `name_1` ..
//!    `name_5`. If all six are taken the step fails for good.
//!
//! Both steps run inside [`retry`]. A failed step does not stop the next
//! one and nothing is rolled back; whatever is still missing is reported
//! through [`check_postcondition`] and completed by the setup flow.

use crate::db::{Store, StoreError, StoreResult, StoreResultExt};
use crate::models::alias::{alias_candidates, MAX_ALIAS_SUFFIX};
use crate::models::{Profile, UserAlias};
use crate::services::auth_provider::AuthSession;
use crate::services::retry::{retry, AttemptError, RetryError, RetryPolicy};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Display name used when nothing better is known.
pub const FALLBACK_DISPLAY_NAME: &str = "user";

#[derive(Debug, thiserror::Error)]
pub enum BootstrapFailure {
    #[error("all {} alias names derived from {base:?} are taken", MAX_ALIAS_SUFFIX + 1)]
    AliasUnavailable { base: String },

    #[error("{step} failed after {attempts} attempts: {source}")]
    StepFailed {
        step: &'static str,
        attempts: u32,
        source: StoreError,
    },
}

impl BootstrapFailure {
    fn from_retry(step: &'static str, err: RetryError<BootstrapFailure>) -> Self {
        match err {
            RetryError::Terminal(failure) => failure,
            RetryError::Exhausted { attempts, last } => BootstrapFailure::StepFailed {
                step,
                attempts,
                source: last,
            },
        }
    }
}

/// First unmet onboarding requirement, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupReason {
    NoProfile,
    NoTemplate,
    NoUserEntry,
    NoUserDays,
}

impl SetupReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoProfile => "no_profile",
            Self::NoTemplate => "no_template",
            Self::NoUserEntry => "no_user_entry",
            Self::NoUserDays => "no_user_days",
        }
    }
}

impl fmt::Display for SetupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Pick the display name for an identity: the stored one, then auth
/// metadata `name`, `full_name`, the email local part, then `"user"`.
pub fn resolve_display_name(profile: Option<&Profile>, session: &AuthSession) -> String {
    non_blank(profile.map(|p| p.display_name.as_str()))
        .or_else(|| non_blank(session.user_metadata.name.as_deref()))
        .or_else(|| non_blank(session.user_metadata.full_name.as_deref()))
        .or_else(|| non_blank(session.email.as_deref().and_then(|e| e.split('@').next())))
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string()
}

/// What a bootstrap run found, created, and failed to do.
#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub profile: Option<Profile>,
    pub profile_created: bool,
    pub alias: Option<UserAlias>,
    pub alias_created: bool,
    pub failures: Vec<BootstrapFailure>,
}

impl BootstrapReport {
    /// True when some step gave up.
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct AccountBootstrap<'a> {
    store: &'a dyn Store,
    policy: RetryPolicy,
}

impl<'a> AccountBootstrap<'a> {
    pub fn new(store: &'a dyn Store, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn run(&self, session: &AuthSession) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        // Settle once; the per-step retry loops then only pause between attempts.
        if !self.policy.settle.is_zero() {
            tokio::time::sleep(self.policy.settle).await;
        }
        let step_policy = RetryPolicy {
            settle: Duration::ZERO,
            ..self.policy
        };

        match retry("ensure_profile", step_policy, || self.ensure_profile(session)).await {
            Ok((profile, created)) => {
                report.profile = Some(profile);
                report.profile_created = created;
            }
            Err(e) => {
                let failure = BootstrapFailure::from_retry("ensure_profile", e);
                tracing::error!(auth_id = %session.id, error = %failure, "Profile bootstrap failed");
                report.failures.push(failure);
            }
        }

        let display_name = resolve_display_name(report.profile.as_ref(), session);

        match retry("ensure_alias", step_policy, || {
            self.ensure_alias(&session.id, &display_name)
        })
        .await
        {
            Ok((alias, created)) => {
                report.alias = Some(alias);
                report.alias_created = created;
            }
            Err(e) => {
                let failure = BootstrapFailure::from_retry("ensure_alias", e);
                tracing::error!(auth_id = %session.id, error = %failure, "Alias bootstrap failed");
                report.failures.push(failure);
            }
        }

        tracing::info!(
            auth_id = %session.id,
            profile_created = report.profile_created,
            alias_created = report.alias_created,
            alias = report.alias.as_ref().map(|a| a.username.as_str()),
            failures = report.failures.len(),
            "Account bootstrap finished"
        );
        report
    }

    /// One attempt at step 1. Returns the profile and whether it was created.
    async fn ensure_profile(
        &self,
        session: &AuthSession,
    ) -> Result<(Profile, bool), AttemptError<BootstrapFailure>> {
        if let Some(profile) = self.store.get_profile(&session.id).await.optional()? {
            return Ok((profile, false));
        }

        let profile = Profile::new(&session.id, resolve_display_name(None, session));
        match self.store.insert_profile(&profile).await {
            Ok(()) => Ok((profile, true)),
            Err(e) if e.is_conflict() => {
                tracing::debug!(auth_id = %session.id, "Profile created concurrently");
                Ok((self.store.get_profile(&session.id).await?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One attempt at step 2. Returns the alias and whether it was created.
    async fn ensure_alias(
        &self,
        auth_id: &str,
        display_name: &str,
    ) -> Result<(UserAlias, bool), AttemptError<BootstrapFailure>> {
        if let Some(alias) = self.store.get_primary_alias(auth_id).await.optional()? {
            return Ok((alias, false));
        }
        claim_alias(self.store, display_name, auth_id, true).await
    }
}

/// Create an alias named `base`, or the first free suffixed variant.
///
/// A candidate already held by `auth_id` with the same `primary` flag is
/// reused instead of skipped, so concurrent or repeated claims converge on
/// one row. Returns the alias and whether it was created.
pub async fn claim_alias(
    store: &dyn Store,
    base: &str,
    auth_id: &str,
    primary: bool,
) -> Result<(UserAlias, bool), AttemptError<BootstrapFailure>> {
    for candidate in alias_candidates(base) {
        let alias = if primary {
            UserAlias::primary(&candidate, auth_id)
        } else {
            UserAlias::buddy(&candidate, auth_id)
        };
        match store.insert_alias(&alias).await {
            Ok(()) => return Ok((alias, true)),
            Err(e) if e.is_conflict() => {
                let holder = store.get_alias(&candidate).await.optional()?;
                if let Some(existing) =
                    holder.filter(|a| a.auth_id == auth_id && a.primary == primary)
                {
                    return Ok((existing, false));
                }
                tracing::debug!(candidate = %candidate, "Alias name taken, trying next");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AttemptError::Terminal(BootstrapFailure::AliasUnavailable {
        base: base.to_string(),
    }))
}

/// First unmet onboarding requirement for `auth_id`, or `None` when the
/// identity is fully set up.
pub async fn check_postcondition(
    store: &dyn Store,
    auth_id: &str,
) -> StoreResult<Option<SetupReason>> {
    let Some(profile) = store.get_profile(auth_id).await.optional()? else {
        return Ok(Some(SetupReason::NoProfile));
    };
    if profile.template_preference.is_none() {
        return Ok(Some(SetupReason::NoTemplate));
    }
    let Some(alias) = store.get_primary_alias(auth_id).await.optional()? else {
        return Ok(Some(SetupReason::NoUserEntry));
    };
    if store.list_days(&alias.username).await?.is_empty() {
        return Ok(Some(SetupReason::NoUserDays));
    }
    Ok(None)
}
