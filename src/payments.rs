use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// The only currency the storefront charges in.
pub const CURRENCY: &str = "usd";

/// PaymentError
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

// 1. PaymentGateway Contract
/// PaymentGateway
///
/// Defines the contract for the external payments provider. Handlers hold an
/// `Arc<dyn PaymentGateway>`, so the Stripe client and the in-process mock are swappable.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a card payment intent for `amount` minor units of `currency` and returns its
    /// client secret, which the browser uses to confirm the payment.
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<String, PaymentError>;
}

/// Converts a dollar price into cents. Rejects non-finite, non-positive and out-of-range values.
pub fn amount_in_cents(price: f64) -> Option<i64> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let cents = (price * 100.0).round();
    // Upper bound is Stripe's maximum charge amount for USD (eight digits).
    if cents < 1.0 || cents > 99_999_999.0 {
        return None;
    }
    Some(cents as i64)
}

// 2. The Real Implementation (Stripe)
/// StripeGateway
///
/// Calls the Stripe REST API directly with `reqwest`: form-encoded requests, secret key
/// as bearer credential.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    client_secret: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    fn payment_intents_url(&self) -> String {
        format!("{}/v1/payment_intents", self.api_base)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<String, PaymentError> {
        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency),
            ("payment_method_types[]", "card"),
        ];

        let response = self
            .client
            .post(self.payment_intents_url())
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Stripe wraps failures as {"error": {"message": ...}}; fall back to the raw body.
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let intent = response.json::<PaymentIntentResponse>().await?;
        Ok(intent.client_secret)
    }
}

// 3. The Mock Implementation
/// MockPaymentGateway
///
/// In-process stand-in for Stripe, used by the test suites and by local runs without a
/// `STRIPE_SECRET_KEY`. Secrets are deterministic so assertions can inspect them.
#[derive(Clone, Default)]
pub struct MockPaymentGateway {
    /// When true, every call fails as if the provider were down.
    pub should_fail: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<String, PaymentError> {
        if self.should_fail {
            return Err(PaymentError::Unavailable(
                "Mock payment provider: simulated outage".to_string(),
            ));
        }
        Ok(format!("pi_mock_{amount}_{currency}_secret_mock"))
    }
}

/// PaymentsState
///
/// The concrete type used to share the payment gateway across the application state.
pub type PaymentsState = Arc<dyn PaymentGateway>;
