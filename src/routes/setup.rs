// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Onboarding flow endpoints (authenticated).
//!
//! The flow lives in `AppState::setup_sessions`. Handlers take a copy, run
//! the step (which may await storage), and write the copy back, so no map
//! lock is held across an await.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{TemplatePreference, Weekday};
use crate::services::bootstrap::check_postcondition;
use crate::services::setup::{FinalizeReport, SetupFlow, SetupService};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/setup", get(get_setup))
        .route("/api/setup/display-name", post(submit_display_name))
        .route("/api/setup/buddy", post(submit_buddy))
        .route("/api/setup/template", post(submit_template))
        .route("/api/setup/days", post(submit_days))
        .route("/api/setup/back", post(go_back))
        .route("/api/setup/cancel", post(cancel))
}

#[derive(Deserialize)]
pub struct SetupParams {
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNameRequest {
    display_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuddyRequest {
    has_buddy: bool,
    #[serde(default)]
    buddy_name: Option<String>,
}

#[derive(Deserialize)]
pub struct TemplateRequest {
    template: TemplatePreference,
}

#[derive(Deserialize)]
pub struct DaysRequest {
    days: Vec<Weekday>,
}

#[derive(Serialize)]
pub struct DaysResponse {
    flow: SetupFlow,
    result: FinalizeReport,
}

/// The caller's flow, opened if there is none. A flow is forced when the
/// client asks for it or when onboarding is incomplete.
async fn load_flow(state: &AppState, auth_id: &str, force: bool) -> Result<SetupFlow> {
    if let Some(mut flow) = state.setup_sessions.get(auth_id).map(|f| f.value().clone()) {
        flow.forced |= force;
        return Ok(flow);
    }

    let incomplete = check_postcondition(state.db.as_ref(), auth_id)
        .await?
        .is_some();
    let flow = SetupService::new(state.db.as_ref())
        .start(auth_id, force || incomplete)
        .await?;
    tracing::debug!(auth_id, forced = flow.forced, "Setup flow opened");
    Ok(flow)
}

fn save_flow(state: &AppState, flow: &SetupFlow) {
    if flow.is_complete() {
        state.setup_sessions.remove(&flow.auth_id);
    } else {
        state
            .setup_sessions
            .insert(flow.auth_id.clone(), flow.clone());
    }
}

async fn get_setup(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<SetupParams>,
) -> Result<Json<SetupFlow>> {
    let flow = load_flow(&state, &user.auth_id, params.force).await?;
    save_flow(&state, &flow);
    Ok(Json(flow))
}

async fn submit_display_name(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<DisplayNameRequest>,
) -> Result<Json<SetupFlow>> {
    let mut flow = load_flow(&state, &user.auth_id, false).await?;
    SetupService::new(state.db.as_ref())
        .submit_display_name(&mut flow, &body.display_name)
        .await?;
    save_flow(&state, &flow);
    Ok(Json(flow))
}

async fn submit_buddy(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<BuddyRequest>,
) -> Result<Json<SetupFlow>> {
    let mut flow = load_flow(&state, &user.auth_id, false).await?;
    SetupService::new(state.db.as_ref())
        .submit_buddy(&mut flow, body.has_buddy, body.buddy_name.as_deref())
        .await?;
    save_flow(&state, &flow);
    Ok(Json(flow))
}

async fn submit_template(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<TemplateRequest>,
) -> Result<Json<SetupFlow>> {
    let mut flow = load_flow(&state, &user.auth_id, false).await?;
    SetupService::new(state.db.as_ref())
        .submit_template(&mut flow, body.template)
        .await?;
    save_flow(&state, &flow);
    Ok(Json(flow))
}

async fn submit_days(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<DaysRequest>,
) -> Result<Json<DaysResponse>> {
    let mut flow = load_flow(&state, &user.auth_id, false).await?;
    let result = SetupService::new(state.db.as_ref())
        .submit_days(&mut flow, &body.days)
        .await?;
    save_flow(&state, &flow);
    tracing::info!(auth_id = %user.auth_id, "Setup completed");
    Ok(Json(DaysResponse { flow, result }))
}

async fn go_back(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SetupFlow>> {
    let mut flow = load_flow(&state, &user.auth_id, false).await?;
    flow.back()?;
    save_flow(&state, &flow);
    Ok(Json(flow))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    let flow = load_flow(&state, &user.auth_id, false).await?;
    flow.cancel()?;
    state.setup_sessions.remove(&user.auth_id);
    tracing::info!(auth_id = %user.auth_id, "Setup dismissed");
    Ok(Json(serde_json::json!({ "cancelled": true })))
}
