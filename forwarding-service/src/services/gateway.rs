//! Payment gateway client.
//!
//! Outbound boundary for checkout-session creation. The wire protocol and
//! webhook signature verification belong to the gateway integration layer;
//! the domain only needs a session reference back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fastybox_core::error::AppError;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Configuration for the HTTP gateway client.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the payment gateway API.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Currency for checkout sessions (e.g. "usd").
    pub currency: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stripe.com".to_string(),
            api_key: String::new(),
            currency: "usd".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Session handle returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Gateway session reference (stored as the payment's transaction id).
    pub session_id: String,
    /// URL the customer is redirected to for payment.
    pub redirect_url: Option<String>,
}

/// Outbound gateway boundary.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        amount: Decimal,
        currency: &str,
        description: &str,
        metadata: HashMap<String, String>,
    ) -> Result<CheckoutSession, AppError>;
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    /// Amount in the smallest currency unit.
    amount: i64,
    currency: &'a str,
    description: &'a str,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: String,
    url: Option<String>,
}

/// HTTP gateway client with bounded timeouts.
#[derive(Clone)]
pub struct HttpCheckoutGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpCheckoutGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::ExternalDependency(format!("gateway client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl CheckoutGateway for HttpCheckoutGateway {
    #[instrument(skip(self, metadata), fields(amount = %amount))]
    async fn create_checkout_session(
        &self,
        amount: Decimal,
        currency: &str,
        description: &str,
        metadata: HashMap<String, String>,
    ) -> Result<CheckoutSession, AppError> {
        // Gateways take the amount in cents.
        let amount_in_cents = (amount * Decimal::new(100, 0))
            .trunc()
            .to_i64()
            .ok_or_else(|| AppError::ExternalDependency("amount out of range".to_string()))?;

        let body = CreateSessionRequest {
            amount: amount_in_cents,
            currency,
            description,
            metadata,
        };

        let url = format!("{}/v1/checkout/sessions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalDependency(format!("checkout session: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalDependency(format!(
                "checkout session rejected ({}): {}",
                status, detail
            )));
        }

        let session: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalDependency(format!("checkout session body: {}", e)))?;

        info!(session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            session_id: session.id,
            redirect_url: session.url,
        })
    }
}

/// Deterministic gateway for tests and local development.
pub struct MockCheckoutGateway {
    counter: AtomicU64,
    fail: bool,
}

impl MockCheckoutGateway {
    pub fn new(fail: bool) -> Self {
        Self {
            counter: AtomicU64::new(0),
            fail,
        }
    }
}

#[async_trait]
impl CheckoutGateway for MockCheckoutGateway {
    async fn create_checkout_session(
        &self,
        _amount: Decimal,
        _currency: &str,
        _description: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<CheckoutSession, AppError> {
        if self.fail {
            return Err(AppError::ExternalDependency(
                "mock gateway unavailable".to_string(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CheckoutSession {
            session_id: format!("cs_test_{:08}", n),
            redirect_url: Some(format!("https://checkout.test/session/{}", n)),
        })
    }
}
