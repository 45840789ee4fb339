// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plan list, checkout and plan changes.
//!
//! Checkout and plan changes are called by the frontend's subscription
//! page, which identifies the user by `userId`. A paid plan only takes
//! effect with the checkout token from the success URL.

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::SubscriptionPlan;
use crate::services::payments::CheckoutRequest;
use crate::services::subscription::{
    apply_plan, plan_catalog, sign_checkout_token, subscription_status, verify_checkout_token,
    PlanInfo, SubscriptionStatus,
};
use crate::AppState;

/// Billing routes that need no session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/plans", get(list_plans))
        .route("/api/create-checkout-session", post(create_checkout_session))
        .route("/api/update-subscription", post(update_subscription))
}

/// Billing routes for the signed-in user.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/subscription", get(get_subscription))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    #[serde(default)]
    plan_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_email: Option<String>,
}

#[derive(Serialize)]
pub struct CheckoutSessionResponse {
    url: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    free: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    plan: Option<String>,
    #[serde(default)]
    checkout_token: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateSubscriptionResponse {
    success: bool,
}

fn required(field: Option<String>, name: &str) -> Result<String> {
    field
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", name)))
}

fn parse_plan(value: &str) -> Result<SubscriptionPlan> {
    value
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid plan selected".to_string()))
}

/// Page the checkout returns to.
fn subscription_page(frontend_url: &str) -> String {
    format!("{}/settings/subscription", frontend_url)
}

async fn list_plans() -> Json<Vec<PlanInfo>> {
    Json(plan_catalog())
}

async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SubscriptionStatus>> {
    Ok(Json(
        subscription_status(state.db.as_ref(), &user.auth_id).await?,
    ))
}

async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckoutSessionRequest>,
) -> Result<Json<CheckoutSessionResponse>> {
    let user_id = required(body.user_id, "userId")?;
    let plan = parse_plan(body.plan_id.as_deref().unwrap_or_default())?;

    // Unknown user is a 404 before anything is sent to the provider.
    state.db.get_profile(&user_id).await?;

    let page = subscription_page(&state.config.frontend_url);
    let encoded_user = urlencoding::encode(&user_id);

    if !plan.is_paid() {
        return Ok(Json(CheckoutSessionResponse {
            url: format!("{}?success=true&plan={}&userId={}", page, plan, encoded_user),
            free: true,
        }));
    }

    let token = sign_checkout_token(
        &user_id,
        plan,
        chrono::Utc::now().timestamp(),
        &state.config.checkout_signing_key,
    )?;
    let request = CheckoutRequest {
        plan,
        user_id: user_id.clone(),
        customer_email: body.user_email.filter(|e| !e.is_empty()),
        success_url: format!(
            "{}?success=true&plan={}&userId={}&checkoutToken={}",
            page, plan, encoded_user, token
        ),
        cancel_url: format!("{}?canceled=true", page),
    };

    let url = state
        .payments
        .create_checkout_session(&request)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, %plan, error = %e, "Checkout session failed");
            AppError::PaymentProvider(e.to_string())
        })?;

    Ok(Json(CheckoutSessionResponse { url, free: false }))
}

async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateSubscriptionRequest>,
) -> Result<Json<UpdateSubscriptionResponse>> {
    let user_id = required(body.user_id, "userId")?;
    let plan = parse_plan(&required(body.plan, "plan")?)?;

    if plan.is_paid() {
        let token = body
            .checkout_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::BadRequest("checkoutToken is required".to_string()))?;
        verify_checkout_token(
            &token,
            &user_id,
            plan,
            chrono::Utc::now().timestamp(),
            &state.config.checkout_signing_key,
        )
        .map_err(|e| {
            tracing::warn!(user_id = %user_id, %plan, error = %e, "Rejected checkout token");
            AppError::BadRequest(e.to_string())
        })?;
    }

    apply_plan(state.db.as_ref(), &user_id, plan).await?;
    Ok(Json(UpdateSubscriptionResponse { success: true }))
}
