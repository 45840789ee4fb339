//! Profile model: one document per authenticated identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How the user wants their exercise lists initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum TemplatePreference {
    /// Seed selected days from the built-in template.
    Template,
    /// Start with empty days.
    Fresh,
}

/// Subscription tier stored on the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Plus,
    Pro,
}

/// Workout-day limit on the free tier.
pub const FREE_PLAN_MAX_DAYS: usize = 3;

impl SubscriptionPlan {
    pub const ALL: [SubscriptionPlan; 3] = [Self::Free, Self::Plus, Self::Pro];

    /// Maximum number of day assignments per alias; `None` is unlimited.
    pub fn max_workout_days(self) -> Option<usize> {
        match self {
            Self::Free => Some(FREE_PLAN_MAX_DAYS),
            Self::Plus | Self::Pro => None,
        }
    }

    /// Whether an alias that already has `current_days` may add one more.
    pub fn allows_another_day(self, current_days: usize) -> bool {
        self.max_workout_days()
            .map_or(true, |limit| current_days < limit)
    }

    pub fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Plus => "plus",
            Self::Pro => "pro",
        }
    }
}

impl fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown subscription plan: {0}")]
pub struct UnknownPlan(pub String);

impl FromStr for SubscriptionPlan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "plus" => Ok(Self::Plus),
            "pro" => Ok(Self::Pro),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

/// Profile stored in Firestore, keyed by the identity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Identity id issued by the auth provider (also the document ID)
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub has_buddy: bool,
    #[serde(default)]
    pub buddy_name: Option<String>,
    /// `None` until the setup flow has stored a choice
    #[serde(default)]
    pub template_preference: Option<TemplatePreference>,
    #[serde(default)]
    pub subscription_plan: SubscriptionPlan,
    #[serde(default)]
    pub subscription_updated_at: Option<String>,
    pub created_at: String,
}

impl Profile {
    /// A freshly bootstrapped profile: onboarding incomplete, free plan.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            has_buddy: false,
            buddy_name: None,
            template_preference: None,
            subscription_plan: SubscriptionPlan::Free,
            subscription_updated_at: None,
            created_at: crate::time_utils::now_rfc3339(),
        }
    }
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub has_buddy: Option<bool>,
    pub buddy_name: Option<Option<String>>,
    pub template_preference: Option<Option<TemplatePreference>>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub subscription_updated_at: Option<String>,
}

impl ProfileUpdate {
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(name) = &self.display_name {
            profile.display_name = name.clone();
        }
        if let Some(has_buddy) = self.has_buddy {
            profile.has_buddy = has_buddy;
        }
        if let Some(buddy_name) = &self.buddy_name {
            profile.buddy_name = buddy_name.clone();
        }
        if let Some(template) = self.template_preference {
            profile.template_preference = template;
        }
        if let Some(plan) = self.subscription_plan {
            profile.subscription_plan = plan;
        }
        if let Some(at) = &self.subscription_updated_at {
            profile.subscription_updated_at = Some(at.clone());
        }
    }
}
