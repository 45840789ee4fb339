// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment provider client: creates hosted checkout sessions.

use crate::models::SubscriptionPlan;
use crate::services::subscription::plan_info;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Plan {0} cannot be purchased")]
    NotPurchasable(SubscriptionPlan),

    #[error("Payment provider request failed: {0}")]
    Request(String),
}

/// Everything the provider needs to build a subscription checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub plan: SubscriptionPlan,
    pub user_id: String,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a checkout session and return the URL to send the user to.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<String, PaymentError>;
}

#[derive(Deserialize)]
struct CheckoutSessionResponse {
    url: String,
}

/// Stripe-compatible checkout API client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(base_url: &str, secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn form_fields(request: &CheckoutRequest) -> Result<Vec<(&'static str, String)>, PaymentError> {
        if !request.plan.is_paid() {
            return Err(PaymentError::NotPurchasable(request.plan));
        }
        let info = plan_info(request.plan);
        let product_name = match request.plan {
            SubscriptionPlan::Pro => "Workout Tracker Pro Subscription",
            _ => "Workout Tracker Plus Subscription",
        };

        let mut fields = vec![
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            (
                "line_items[0][price_data][unit_amount]",
                info.price_cents.to_string(),
            ),
            (
                "line_items[0][price_data][recurring][interval]",
                "month".to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                product_name.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][description]",
                info.description.to_string(),
            ),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("metadata[userId]", request.user_id.clone()),
            ("metadata[plan]", request.plan.to_string()),
        ];
        if let Some(email) = &request.customer_email {
            fields.push(("customer_email", email.clone()));
        }
        Ok(fields)
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<String, PaymentError> {
        let fields = Self::form_fields(request)?;
        let url = format!("{}/checkout/sessions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&fields)
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Request(format!("HTTP {}: {}", status, body)));
        }

        let session: CheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Request(format!("JSON parse error: {}", e)))?;

        tracing::info!(
            user_id = %request.user_id,
            plan = %request.plan,
            "Created checkout session"
        );
        Ok(session.url)
    }
}

/// In-process provider that records requests and returns a fixed URL.
#[derive(Default)]
pub struct RecordingPaymentProvider {
    fail: bool,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl RecordingPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentProvider for RecordingPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<String, PaymentError> {
        if self.fail {
            return Err(PaymentError::Request("provider unavailable".to_string()));
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        Ok(format!(
            "https://checkout.example.com/session/{}",
            request.plan
        ))
    }
}
