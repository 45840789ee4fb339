// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::StoreResultExt;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    DayAssignment, ExerciseAssignment, NewSet, Profile, SetLogEntry, UserAlias, Weekday,
};
use crate::models::schedule::UnknownWeekday;
use crate::services::bootstrap::{check_postcondition, SetupReason};
use crate::services::WorkoutService;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/onboarding-status", get(get_onboarding_status))
        .route("/api/aliases", get(list_aliases).post(create_alias))
        .route("/api/aliases/{alias}", put(rename_alias).delete(delete_alias))
        .route("/api/aliases/{alias}/days", get(list_days).post(add_day))
        .route("/api/aliases/{alias}/days/{day}", delete(remove_day))
        .route(
            "/api/aliases/{alias}/exercises",
            get(list_exercises).post(add_exercise),
        )
        .route(
            "/api/aliases/{alias}/exercises/{day}/move",
            post(move_exercise),
        )
        .route(
            "/api/aliases/{alias}/exercises/{day}/{position}",
            delete(remove_exercise),
        )
        .route(
            "/api/aliases/{alias}/sets",
            get(list_sets).post(add_set).delete(clear_sets),
        )
        .route("/api/sets/{id}", delete(delete_set))
}

/// Weekday from a path or query segment, case-insensitive.
pub(crate) fn parse_day(value: &str) -> Result<Weekday> {
    value
        .parse()
        .map_err(|e: UnknownWeekday| AppError::BadRequest(e.to_string()))
}

fn check<T: Validate>(body: &T) -> Result<()> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub auth_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub profile: Option<Profile>,
    /// Primary alias name, if one exists yet
    pub username: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown[]"))]
    pub aliases: Vec<UserAlias>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = state.db.get_profile(&user.auth_id).await.optional()?;
    let aliases = state.db.list_aliases(&user.auth_id).await?;
    let username = aliases
        .iter()
        .find(|a| a.primary)
        .map(|a| a.username.clone());

    Ok(Json(MeResponse {
        auth_id: user.auth_id,
        profile,
        username,
        aliases,
    }))
}

#[derive(Serialize)]
pub struct OnboardingStatus {
    pub complete: bool,
    pub reason: Option<SetupReason>,
}

async fn get_onboarding_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OnboardingStatus>> {
    let reason = check_postcondition(state.db.as_ref(), &user.auth_id).await?;
    Ok(Json(OnboardingStatus {
        complete: reason.is_none(),
        reason,
    }))
}

// ─── Aliases ─────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct AliasRequest {
    #[validate(length(min = 1, max = 50))]
    username: String,
}

async fn list_aliases(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<UserAlias>>> {
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    Ok(Json(service.list_aliases().await?))
}

async fn create_alias(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<AliasRequest>,
) -> Result<(StatusCode, Json<UserAlias>)> {
    check(&body)?;
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    let alias = service.create_alias(&body.username).await?;
    Ok((StatusCode::CREATED, Json(alias)))
}

async fn rename_alias(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
    Json(body): Json<AliasRequest>,
) -> Result<Json<UserAlias>> {
    check(&body)?;
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    Ok(Json(service.rename_alias(&alias, &body.username).await?))
}

async fn delete_alias(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
) -> Result<StatusCode> {
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    service.delete_alias(&alias).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Days ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DayRequest {
    day: Weekday,
}

async fn list_days(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
) -> Result<Json<Vec<DayAssignment>>> {
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    Ok(Json(service.list_days(&alias).await?))
}

async fn add_day(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
    Json(body): Json<DayRequest>,
) -> Result<(StatusCode, Json<DayAssignment>)> {
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    let day = service.add_day(&alias, body.day).await?;
    Ok((StatusCode::CREATED, Json(day)))
}

async fn remove_day(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((alias, day)): Path<(String, String)>,
) -> Result<StatusCode> {
    let day = parse_day(&day)?;
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    service.remove_day(&alias, day).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Exercises ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ExerciseQuery {
    #[serde(default)]
    day: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ExerciseRequest {
    day: Weekday,
    #[validate(length(min = 1, max = 50))]
    name: String,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    from: u32,
    to: u32,
}

async fn list_exercises(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
    Query(query): Query<ExerciseQuery>,
) -> Result<Json<Vec<ExerciseAssignment>>> {
    let day = query.day.as_deref().map(parse_day).transpose()?;
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    Ok(Json(service.list_exercises(&alias, day).await?))
}

async fn add_exercise(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
    Json(body): Json<ExerciseRequest>,
) -> Result<(StatusCode, Json<Vec<ExerciseAssignment>>)> {
    check(&body)?;
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    let exercises = service.add_exercise(&alias, body.day, &body.name).await?;
    Ok((StatusCode::CREATED, Json(exercises)))
}

async fn move_exercise(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((alias, day)): Path<(String, String)>,
    Json(body): Json<MoveRequest>,
) -> Result<Json<Vec<ExerciseAssignment>>> {
    let day = parse_day(&day)?;
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    Ok(Json(
        service
            .move_exercise(&alias, day, body.from, body.to)
            .await?,
    ))
}

async fn remove_exercise(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((alias, day, position)): Path<(String, String, u32)>,
) -> Result<Json<Vec<ExerciseAssignment>>> {
    let day = parse_day(&day)?;
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    Ok(Json(service.remove_exercise(&alias, day, position).await?))
}

// ─── Set log ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SetQuery {
    #[serde(default)]
    exercise: Option<String>,
}

#[derive(Deserialize)]
pub struct SetRequest {
    exercise: String,
    #[serde(flatten)]
    set: NewSet,
}

#[derive(Serialize)]
pub struct ClearSetsResponse {
    pub removed: usize,
}

async fn list_sets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
    Query(query): Query<SetQuery>,
) -> Result<Json<Vec<SetLogEntry>>> {
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    Ok(Json(
        service
            .list_sets(&alias, query.exercise.as_deref())
            .await?,
    ))
}

async fn add_set(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
    Json(body): Json<SetRequest>,
) -> Result<(StatusCode, Json<SetLogEntry>)> {
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    let entry = service.add_set(&alias, &body.exercise, body.set).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn clear_sets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(alias): Path<String>,
) -> Result<Json<ClearSetsResponse>> {
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    let removed = service.clear_sets(&alias).await?;
    Ok(Json(ClearSetsResponse { removed }))
}

async fn delete_set(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let service = WorkoutService::new(state.db.as_ref(), &user.auth_id);
    service.delete_set(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
