// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Workout Tracker: log sets, plan workout days, share them with a buddy.
//!
//! This crate provides the backend API: account bootstrap after sign-in,
//! the onboarding flow, the subscription gate and billing endpoints, and
//! a live view of the workout data pushed over Server-Sent Events.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use dashmap::DashMap;
use db::Store;
use services::{AuthProvider, PaymentProvider, RetryPolicy, SetupFlow};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Store>,
    pub auth_provider: Arc<dyn AuthProvider>,
    pub payments: Arc<dyn PaymentProvider>,
    /// In-progress onboarding flows keyed by identity id
    pub setup_sessions: DashMap<String, SetupFlow>,
    /// Retry budget for the account bootstrap
    pub bootstrap_retry: RetryPolicy,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn Store>,
        auth_provider: Arc<dyn AuthProvider>,
        payments: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            config,
            db,
            auth_provider,
            payments,
            setup_sessions: DashMap::new(),
            bootstrap_retry: RetryPolicy::default(),
        }
    }
}
