// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Landing route guard: sends signed-in users with incomplete onboarding
//! to the forced setup flow.

use axum::{
    extract::State,
    http::HeaderMap,
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::middleware::auth::{session_token, verify_jwt};
use crate::routes::auth::setup_redirect_url;
use crate::services::bootstrap::check_postcondition;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(guard))
}

async fn guard(State(state): State<Arc<AppState>>, jar: CookieJar, headers: HeaderMap) -> Redirect {
    let frontend_url = &state.config.frontend_url;
    let landing = format!("{}/", frontend_url);

    let Some(user) = session_token(&jar, &headers)
        .and_then(|token| verify_jwt(&token, &state.config.jwt_signing_key))
    else {
        return Redirect::temporary(&landing);
    };

    match check_postcondition(state.db.as_ref(), &user.auth_id).await {
        Ok(Some(reason)) => {
            tracing::debug!(auth_id = %user.auth_id, %reason, "Redirecting to setup");
            Redirect::temporary(&setup_redirect_url(frontend_url, &user.auth_id, Some(reason)))
        }
        Ok(None) => Redirect::temporary(&landing),
        Err(e) => {
            // A storage hiccup should not lock the user out of the app.
            tracing::warn!(auth_id = %user.auth_id, error = %e, "Onboarding check failed, letting through");
            Redirect::temporary(&landing)
        }
    }
}
