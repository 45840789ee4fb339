// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth_provider;
pub mod bootstrap;
pub mod mirror;
pub mod payments;
pub mod retry;
pub mod setup;
pub mod subscription;
pub mod workout;

pub use auth_provider::{AuthProvider, AuthSession, HttpAuthProvider};
pub use bootstrap::{check_postcondition, AccountBootstrap, BootstrapReport, SetupReason};
pub use mirror::{WorkoutContext, WorkoutSnapshot};
pub use payments::{PaymentProvider, StripeClient};
pub use retry::RetryPolicy;
pub use setup::{SetupFlow, SetupService, SetupStep};
pub use workout::WorkoutService;
