// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth provider client.
//!
//! The provider owns sign-in; this service only exchanges the one-time
//! code from the OAuth redirect for the signed-in identity.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum AuthProviderError {
    #[error("Code exchange rejected: {0}")]
    Rejected(String),

    #[error("Auth provider request failed: {0}")]
    Request(String),
}

/// Metadata the provider copies from the upstream identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,
}

/// The identity returned by a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthSession {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

impl AuthSession {
    pub fn new(id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: id.into(),
            email: email.map(str::to_string),
            user_metadata: UserMetadata::default(),
            app_metadata: AppMetadata::default(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.user_metadata.name = Some(name.to_string());
        self
    }

    pub fn with_full_name(mut self, full_name: &str) -> Self {
        self.user_metadata.full_name = Some(full_name.to_string());
        self
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<AuthSession, AuthProviderError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    user: AuthSession,
}

/// HTTP client for the hosted auth provider.
#[derive(Clone)]
pub struct HttpAuthProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpAuthProvider {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn exchange_code(&self, code: &str) -> Result<AuthSession, AuthProviderError> {
        let url = format!("{}/token", self.base_url);

        let response = self
            .http
            .post(&url)
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "auth_code": code }))
            .send()
            .await
            .map_err(|e| AuthProviderError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthProviderError::Rejected(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthProviderError::Request(format!("HTTP {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthProviderError::Request(format!("JSON parse error: {}", e)))?;

        tracing::info!(
            auth_id = %token.user.id,
            provider = token.user.app_metadata.provider.as_deref().unwrap_or("unknown"),
            "Exchanged auth code"
        );
        Ok(token.user)
    }
}

/// Provider backed by a fixed code → session table. Each code works once.
#[derive(Default)]
pub struct StaticAuthProvider {
    sessions: Mutex<HashMap<String, AuthSession>>,
}

impl StaticAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(self, code: &str, session: AuthSession) -> Self {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(code.to_string(), session);
        }
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn exchange_code(&self, code: &str) -> Result<AuthSession, AuthProviderError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| AuthProviderError::Request("session table poisoned".to_string()))?;
        sessions
            .remove(code)
            .ok_or_else(|| AuthProviderError::Rejected(format!("unknown code {}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_parsing() {
        let json = r#"{
            "access_token": "abc",
            "user": {
                "id": "5f0c",
                "email": "a@b.com",
                "user_metadata": {"full_name": "Alex B"},
                "app_metadata": {"provider": "google"}
            }
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.user.id, "5f0c");
        assert_eq!(token.user.user_metadata.full_name.as_deref(), Some("Alex B"));
        assert_eq!(token.user.user_metadata.name, None);
        assert_eq!(token.user.app_metadata.provider.as_deref(), Some("google"));
    }

    #[tokio::test]
    async fn test_static_codes_are_single_use() {
        let provider =
            StaticAuthProvider::new().with_code("c1", AuthSession::new("id-1", Some("a@b.com")));

        assert_eq!(provider.exchange_code("c1").await.unwrap().id, "id-1");
        assert!(matches!(
            provider.exchange_code("c1").await,
            Err(AuthProviderError::Rejected(_))
        ));
    }
}
