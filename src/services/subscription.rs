// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription plans, the workout-day gate and signed checkout tokens.
//!
//! A paid plan is only applied when the client presents the token that
//! was embedded in the checkout success URL. Tokens are
//! `base64url("user_id|plan|timestamp_hex|signature_hex")` with an
//! HMAC-SHA256 signature over the first three fields.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{ProfileUpdate, SubscriptionPlan};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// How long a checkout token stays valid.
pub const CHECKOUT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Public description of a plan, used for the plan list and upgrade prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanInfo {
    pub id: SubscriptionPlan,
    /// Monthly price in US cents
    pub price_cents: u32,
    pub max_workout_days: Option<usize>,
    pub description: &'static str,
    pub features: Vec<&'static str>,
    pub active: bool,
}

pub fn monthly_price_cents(plan: SubscriptionPlan) -> u32 {
    match plan {
        SubscriptionPlan::Free => 0,
        SubscriptionPlan::Plus => 500,
        SubscriptionPlan::Pro => 2500,
    }
}

pub fn plan_info(plan: SubscriptionPlan) -> PlanInfo {
    let (description, features, active) = match plan {
        SubscriptionPlan::Free => (
            "Basic plan for casual workouts",
            vec![
                "Up to 3 workout days",
                "Basic workout tracking",
                "Single user account",
            ],
            true,
        ),
        SubscriptionPlan::Plus => (
            "Perfect for regular gym-goers",
            vec![
                "Unlimited workout days",
                "Advanced workout tracking",
                "Progress analytics",
                "Priority support",
            ],
            true,
        ),
        SubscriptionPlan::Pro => (
            "For fitness enthusiasts and trainers",
            vec![
                "All Plus features",
                "AI workout recommendations",
                "Personal trainer tools",
                "Workout plan creation",
                "Premium analytics",
            ],
            false,
        ),
    };

    PlanInfo {
        id: plan,
        price_cents: monthly_price_cents(plan),
        max_workout_days: plan.max_workout_days(),
        description,
        features,
        active,
    }
}

pub fn plan_catalog() -> Vec<PlanInfo> {
    SubscriptionPlan::ALL.into_iter().map(plan_info).collect()
}

/// Gate for adding a workout day to an alias that has `current_days`.
pub fn ensure_day_allowed(plan: SubscriptionPlan, current_days: usize) -> Result<()> {
    match plan.max_workout_days() {
        Some(limit) if current_days >= limit => {
            tracing::info!(%plan, current_days, limit, "Workout day limit reached");
            Err(AppError::UpgradeRequired { plan, limit })
        }
        _ => Ok(()),
    }
}

// ─── Checkout Tokens ─────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutTokenError {
    #[error("malformed checkout token")]
    Malformed,
    #[error("checkout token signature mismatch")]
    BadSignature,
    #[error("checkout token issued for a different user or plan")]
    WrongSubject,
    #[error("checkout token expired")]
    Expired,
}

fn sign_payload(payload: &str, key: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Sign a checkout token for `user_id` upgrading to `plan` at `issued_at`
/// (Unix seconds).
pub fn sign_checkout_token(
    user_id: &str,
    plan: SubscriptionPlan,
    issued_at: i64,
    key: &[u8],
) -> Result<String> {
    let payload = format!("{}|{}|{:x}", user_id, plan, issued_at);
    let signature = sign_payload(&payload, key)?;
    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Check a token against the user and plan being applied.
pub fn verify_checkout_token(
    token: &str,
    user_id: &str,
    plan: SubscriptionPlan,
    now: i64,
    key: &[u8],
) -> std::result::Result<(), CheckoutTokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| CheckoutTokenError::Malformed)?;
    let decoded = String::from_utf8(bytes).map_err(|_| CheckoutTokenError::Malformed)?;

    // Split from the right: the user id is the only free-form field.
    let mut parts = decoded.rsplitn(4, '|');
    let signature = parts.next().ok_or(CheckoutTokenError::Malformed)?;
    let timestamp_hex = parts.next().ok_or(CheckoutTokenError::Malformed)?;
    let token_plan = parts.next().ok_or(CheckoutTokenError::Malformed)?;
    let token_user = parts.next().ok_or(CheckoutTokenError::Malformed)?;

    let payload = format!("{}|{}|{}", token_user, token_plan, timestamp_hex);
    let expected = sign_payload(&payload, key).map_err(|_| CheckoutTokenError::BadSignature)?;
    if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        tracing::warn!(user_id, "Checkout token signature mismatch");
        return Err(CheckoutTokenError::BadSignature);
    }

    if token_user != user_id || token_plan != plan.as_str() {
        return Err(CheckoutTokenError::WrongSubject);
    }

    let issued_at =
        i64::from_str_radix(timestamp_hex, 16).map_err(|_| CheckoutTokenError::Malformed)?;
    if now - issued_at > CHECKOUT_TOKEN_TTL_SECS || issued_at > now + 60 {
        return Err(CheckoutTokenError::Expired);
    }

    Ok(())
}

// ─── Plan Changes ────────────────────────────────────────────────

/// Current plan and usage for an identity.
#[derive(Debug, Serialize)]
pub struct SubscriptionStatus {
    pub plan: SubscriptionPlan,
    pub max_workout_days: Option<usize>,
    pub subscription_updated_at: Option<String>,
    pub workout_days: usize,
}

pub async fn subscription_status(store: &dyn Store, auth_id: &str) -> Result<SubscriptionStatus> {
    let profile = store.get_profile(auth_id).await?;
    let primary = store.get_primary_alias(auth_id).await?;
    let days = store.list_days(&primary.username).await?;

    Ok(SubscriptionStatus {
        plan: profile.subscription_plan,
        max_workout_days: profile.subscription_plan.max_workout_days(),
        subscription_updated_at: profile.subscription_updated_at,
        workout_days: days.len(),
    })
}

/// Store a new plan on the profile. Existing day assignments above a
/// lower limit are kept; the gate only applies to new days.
pub async fn apply_plan(store: &dyn Store, user_id: &str, plan: SubscriptionPlan) -> Result<()> {
    let update = ProfileUpdate {
        subscription_plan: Some(plan),
        subscription_updated_at: Some(crate::time_utils::now_rfc3339()),
        ..Default::default()
    };
    let profile = store.update_profile(user_id, &update).await?;

    tracing::info!(user_id, plan = %profile.subscription_plan, "Subscription updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"checkout_test_key";

    #[test]
    fn test_gate_blocks_fourth_free_day() {
        assert!(ensure_day_allowed(SubscriptionPlan::Free, 2).is_ok());
        match ensure_day_allowed(SubscriptionPlan::Free, 3) {
            Err(AppError::UpgradeRequired { plan, limit }) => {
                assert_eq!(plan, SubscriptionPlan::Free);
                assert_eq!(limit, 3);
            }
            other => panic!("expected upgrade prompt, got {:?}", other),
        }
    }

    #[test]
    fn test_gate_never_blocks_paid_plans() {
        assert!(ensure_day_allowed(SubscriptionPlan::Plus, 7).is_ok());
        assert!(ensure_day_allowed(SubscriptionPlan::Pro, 100).is_ok());
    }

    #[test]
    fn test_catalog_marks_pro_inactive() {
        let plans = plan_catalog();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[1].price_cents, 500);
        assert!(plans[1].active);
        assert_eq!(plans[2].id, SubscriptionPlan::Pro);
        assert!(!plans[2].active);
    }

    #[test]
    fn test_checkout_token_roundtrip() {
        let token = sign_checkout_token("user-1", SubscriptionPlan::Plus, 1_000, KEY).unwrap();
        assert_eq!(
            verify_checkout_token(&token, "user-1", SubscriptionPlan::Plus, 1_100, KEY),
            Ok(())
        );
    }

    #[test]
    fn test_checkout_token_rejects_other_plan_or_user() {
        let token = sign_checkout_token("user-1", SubscriptionPlan::Plus, 1_000, KEY).unwrap();
        assert_eq!(
            verify_checkout_token(&token, "user-1", SubscriptionPlan::Pro, 1_100, KEY),
            Err(CheckoutTokenError::WrongSubject)
        );
        assert_eq!(
            verify_checkout_token(&token, "user-2", SubscriptionPlan::Plus, 1_100, KEY),
            Err(CheckoutTokenError::WrongSubject)
        );
    }

    #[test]
    fn test_checkout_token_rejects_tampering_and_expiry() {
        let token = sign_checkout_token("user-1", SubscriptionPlan::Plus, 1_000, KEY).unwrap();
        assert_eq!(
            verify_checkout_token(&token, "user-1", SubscriptionPlan::Plus, 1_100, b"other"),
            Err(CheckoutTokenError::BadSignature)
        );
        assert_eq!(
            verify_checkout_token(
                &token,
                "user-1",
                SubscriptionPlan::Plus,
                1_000 + CHECKOUT_TOKEN_TTL_SECS + 1,
                KEY
            ),
            Err(CheckoutTokenError::Expired)
        );
        assert_eq!(
            verify_checkout_token("not-base64!", "user-1", SubscriptionPlan::Plus, 1_100, KEY),
            Err(CheckoutTokenError::Malformed)
        );
    }
}
