// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in callback and logout.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::BootstrapFailurePolicy;
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::services::bootstrap::{check_postcondition, AccountBootstrap, SetupReason};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/callback", get(auth_callback))
        .route("/auth/logout", get(logout_redirect).post(logout))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// `Set-Cookie` value for the session cookie. `Secure` is only set when
/// the frontend is served over HTTPS so local development works.
pub fn session_cookie(frontend_url: &str, value: &str, max_age: usize) -> String {
    let secure = if frontend_url.starts_with("https://") {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE, value, max_age, secure
    )
}

/// Where to send a signed-in user whose onboarding is incomplete.
pub fn setup_redirect_url(frontend_url: &str, auth_id: &str, reason: Option<SetupReason>) -> String {
    let mut url = format!(
        "{}/setup?userId={}&force=true",
        frontend_url,
        urlencoding::encode(auth_id)
    );
    if let Some(reason) = reason {
        url.push_str("&reason=");
        url.push_str(reason.as_str());
    }
    url
}

/// OAuth redirect target: exchange the code, bootstrap the account, set
/// the session cookie, and send the user on.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let frontend_url = &state.config.frontend_url;

    if let Some(error) = params.error {
        tracing::warn!(
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "Sign-in error from auth provider"
        );
        let mut redirect = format!("{}/?error={}", frontend_url, urlencoding::encode(&error));
        if let Some(description) = params.error_description {
            redirect.push_str("&error_description=");
            redirect.push_str(&urlencoding::encode(&description));
        }
        return Ok(Redirect::temporary(&redirect).into_response());
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!("Auth callback without code");
        return Ok(Redirect::temporary(&format!("{}/?error=missing_code", frontend_url)).into_response());
    };

    let session = match state.auth_provider.exchange_code(&code).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Auth code exchange failed");
            let redirect = format!(
                "{}/?error=auth_failed&error_description={}",
                frontend_url,
                urlencoding::encode(&e.to_string())
            );
            return Ok(Redirect::temporary(&redirect).into_response());
        }
    };

    let report = AccountBootstrap::new(state.db.as_ref(), state.bootstrap_retry)
        .run(&session)
        .await;

    if report.is_degraded()
        && state.config.bootstrap_failure_policy == BootstrapFailurePolicy::HardBlock
    {
        tracing::error!(
            auth_id = %session.id,
            failures = report.failures.len(),
            "Account bootstrap incomplete, refusing session"
        );
        return Ok(
            Redirect::temporary(&format!("{}/?error=bootstrap_failed", frontend_url))
                .into_response(),
        );
    }

    let redirect = match check_postcondition(state.db.as_ref(), &session.id).await {
        Ok(None) => format!("{}/", frontend_url),
        Ok(Some(reason)) => {
            tracing::info!(auth_id = %session.id, %reason, "Onboarding incomplete");
            setup_redirect_url(frontend_url, &session.id, Some(reason))
        }
        Err(e) => {
            tracing::warn!(auth_id = %session.id, error = %e, "Post-condition check failed");
            setup_redirect_url(frontend_url, &session.id, None)
        }
    };

    let jwt = create_jwt(&session.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    Ok((
        [(
            header::SET_COOKIE,
            session_cookie(frontend_url, &jwt, SESSION_TTL_SECS),
        )],
        Redirect::temporary(&redirect),
    )
        .into_response())
}

/// Clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            session_cookie(&state.config.frontend_url, "", 0),
        )],
    )
        .into_response()
}

/// Clear the session cookie and return to the frontend.
async fn logout_redirect(State(state): State<Arc<AppState>>) -> Response {
    let frontend_url = &state.config.frontend_url;
    (
        [(header::SET_COOKIE, session_cookie(frontend_url, "", 0))],
        Redirect::temporary(&format!("{}/", frontend_url)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let local = session_cookie("http://localhost:3000", "tok", 60);
        assert_eq!(
            local,
            "workout_token=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
        );
        let prod = session_cookie("https://workouts.example.com", "", 0);
        assert!(prod.contains("Max-Age=0"));
        assert!(prod.ends_with("; Secure"));
    }

    #[test]
    fn test_setup_redirect_url() {
        assert_eq!(
            setup_redirect_url("http://app", "id 1", Some(SetupReason::NoTemplate)),
            "http://app/setup?userId=id%201&force=true&reason=no_template"
        );
        assert_eq!(
            setup_redirect_url("http://app", "id1", None),
            "http://app/setup?userId=id1&force=true"
        );
    }
}
