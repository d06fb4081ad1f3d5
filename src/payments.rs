//! Payment gateway integration.
//!
//! The backend only ever asks the gateway for a payment intent and hands the
//! client secret back to the browser; completed payments are recorded as
//! transactions by the lifecycle service, which never calls the gateway
//! itself.

use crate::types::Money;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Payment gateway result.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Payment gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never reached the gateway or the response was unreadable.
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway refused the request.
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
}

/// A created payment intent, ready for client-side confirmation.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Client-usable secret for confirming the payment.
    pub client_secret: String,
}

/// Abstraction over payment processors (Stripe and friends).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for `amount` in `currency`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the gateway is unreachable or rejects
    /// the request.
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
    ) -> GatewayResult<PaymentIntent>;
}

/// Stripe REST API client.
#[derive(Clone, Debug)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    /// Creates a client talking to the live Stripe API.
    #[must_use]
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_api_base(secret_key, "https://api.stripe.com")
    }

    /// Creates a client against a custom API base (stripe-mock, tests).
    #[must_use]
    pub fn with_api_base(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
    ) -> GatewayResult<PaymentIntent> {
        let params = [
            ("amount", amount.cents().to_string()),
            ("currency", currency.to_owned()),
            ("payment_method_types[]", "card".to_owned()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(GatewayError::Rejected(message));
        }

        let intent = response.json::<PaymentIntent>().await?;
        tracing::info!(amount = amount.cents(), currency, "payment intent created");
        Ok(intent)
    }
}

/// Mock payment gateway (always succeeds, for development and tests).
#[derive(Clone, Debug, Default)]
pub struct MockPaymentGateway;

impl MockPaymentGateway {
    /// Creates a new mock gateway.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates an Arc-wrapped instance for sharing.
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
    ) -> GatewayResult<PaymentIntent> {
        let client_secret = format!("pi_mock_{}_secret_{}", Uuid::new_v4(), Uuid::new_v4());
        tracing::info!(amount = amount.cents(), currency, "mock payment intent created");
        Ok(PaymentIntent { client_secret })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_gateway_fabricates_client_secret() {
        let gateway = MockPaymentGateway::new();
        let intent = gateway
            .create_payment_intent(Money::from_dollars(120), "usd")
            .await
            .unwrap();
        assert!(intent.client_secret.starts_with("pi_mock_"));
        assert!(intent.client_secret.contains("_secret_"));
    }
}
