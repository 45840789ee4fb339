// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::db::{StoreError, StoreErrorKind};
use crate::models::SubscriptionPlan;
use crate::services::subscription::{plan_catalog, PlanInfo};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("The {plan} plan allows at most {limit} workout days")]
    UpgradeRequired {
        plan: SubscriptionPlan,
        limit: usize,
    },

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err.kind {
            StoreErrorKind::NotFound => AppError::NotFound(err.message),
            StoreErrorKind::Conflict => AppError::Conflict(err.message),
            StoreErrorKind::Transient => AppError::Unavailable(err.message),
            StoreErrorKind::Fatal => AppError::Database(err.message),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plans: Option<Vec<PlanInfo>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut plans = None;
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::UpgradeRequired { .. } => {
                plans = Some(plan_catalog());
                (
                    StatusCode::PAYMENT_REQUIRED,
                    "upgrade_required",
                    Some(self.to_string()),
                )
            }
            AppError::PaymentProvider(msg) => {
                tracing::error!(error = %msg, "Payment provider error");
                (StatusCode::INTERNAL_SERVER_ERROR, "payment_provider_error", None)
            }
            AppError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Storage temporarily unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            plans,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
