// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User alias model: a display name workouts are logged under.

use serde::{Deserialize, Serialize};

/// Highest numeric suffix tried when an alias name is taken.
pub const MAX_ALIAS_SUFFIX: u32 = 5;

/// Alias document stored in Firestore, keyed by `username`.
///
/// Usernames are unique across the whole store. An identity owns one
/// primary alias (its own display name) and any number of buddy aliases,
/// which have no authentication of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAlias {
    pub username: String,
    /// Owning identity
    pub auth_id: String,
    /// True for the identity's own alias
    #[serde(default)]
    pub primary: bool,
    pub created_at: String,
}

impl UserAlias {
    pub fn primary(username: impl Into<String>, auth_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth_id: auth_id.into(),
            primary: true,
            created_at: crate::time_utils::now_rfc3339(),
        }
    }

    pub fn buddy(username: impl Into<String>, auth_id: impl Into<String>) -> Self {
        Self {
            primary: false,
            ..Self::primary(username, auth_id)
        }
    }
}

/// Candidate names for `base` in the order they are tried:
/// `base`, `base_1`, ..., `base_5`.
pub fn alias_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    (0..=MAX_ALIAS_SUFFIX).map(move |n| {
        if n == 0 {
            base.to_string()
        } else {
            format!("{}_{}", base, n)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_candidates() {
        let names: Vec<String> = alias_candidates("Sam").collect();
        assert_eq!(
            names,
            vec!["Sam", "Sam_1", "Sam_2", "Sam_3", "Sam_4", "Sam_5"]
        );
    }

    #[test]
    fn test_buddy_is_not_primary() {
        let alias = UserAlias::buddy("Sam", "auth-1");
        assert!(!alias.primary);
        assert_eq!(alias.auth_id, "auth-1");
    }
}
