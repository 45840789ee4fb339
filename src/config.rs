//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. Secrets come from the environment
//! (Cloud Run injects them via secret bindings); for local development a
//! `.env` file is honoured.

use std::env;
use std::str::FromStr;

/// Which storage backend the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Hosted Firestore (or the emulator when `FIRESTORE_EMULATOR_HOST` is set).
    Firestore,
    /// In-process store. Data is lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND", s.to_string())),
        }
    }
}

/// What the auth callback does when the account bootstrap could not
/// establish every row it is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapFailurePolicy {
    /// Issue the session anyway and send the user to the forced setup flow,
    /// which re-runs the missing steps.
    #[default]
    AllowDegraded,
    /// Refuse the session and redirect to the landing page with an error.
    HardBlock,
}

impl FromStr for BootstrapFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow_degraded" => Ok(Self::AllowDegraded),
            "hard_block" => Ok(Self::HardBlock),
            _ => Err(ConfigError::Invalid(
                "BOOTSTRAP_FAILURE_POLICY",
                s.to_string(),
            )),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for redirects and CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Storage backend selection
    pub storage_backend: StorageBackend,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Base URL of the auth provider's token endpoint
    pub auth_provider_url: String,
    /// Base URL of the payment provider API
    pub payment_api_url: String,
    /// Behaviour when account bootstrap is incomplete
    pub bootstrap_failure_policy: BootstrapFailurePolicy,

    // --- Secrets ---
    /// API key sent to the auth provider
    pub auth_provider_key: String,
    /// Payment provider secret key
    pub payment_secret_key: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for checkout success tokens (raw bytes)
    pub checkout_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .parse()?;

        let bootstrap_failure_policy = match env::var("BOOTSTRAP_FAILURE_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => BootstrapFailurePolicy::default(),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage_backend,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            auth_provider_url: env::var("AUTH_PROVIDER_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("AUTH_PROVIDER_URL"))?,
            payment_api_url: env::var("PAYMENT_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            bootstrap_failure_policy,

            auth_provider_key: env::var("AUTH_PROVIDER_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH_PROVIDER_KEY"))?,
            payment_secret_key: env::var("PAYMENT_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("PAYMENT_SECRET_KEY"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            checkout_signing_key: env::var("CHECKOUT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("CHECKOUT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Config for tests: in-memory storage, fixed keys.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            auth_provider_url: "http://localhost:9999/auth/v1".to_string(),
            payment_api_url: "http://localhost:9998/v1".to_string(),
            bootstrap_failure_policy: BootstrapFailurePolicy::AllowDegraded,
            auth_provider_key: "test_auth_key".to_string(),
            payment_secret_key: "sk_test".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            checkout_signing_key: b"test_checkout_key_32_bytes_min!".to_vec(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
