use async_trait::async_trait;
use serde::Deserialize;

use super::{CheckoutSession, PaymentGateway, Product};
use crate::config::PaymentConfig;
use crate::error::AppError;

/// First-party billing gateway spoken to over HTTP. It owns the checkout
/// UX; this service only asks for a session and later hears back on the
/// webhook.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: PaymentConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    checkout_url: String,
    payment_id: String,
}

impl HttpGateway {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_checkout(
        &self,
        user_id: &str,
        product: &Product,
    ) -> Result<CheckoutSession, AppError> {
        let url = format!("{}/v1/checkouts", self.config.api_url.trim_end_matches('/'));
        let resp = self
            .http_client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "user_id": user_id,
                "product_id": product.id,
                "credits": product.credits,
                "amount_cents": product.price_cents,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AppError::Internal(format!(
                "Payment gateway returned {}",
                resp.status()
            )));
        }

        let checkout: CheckoutResponse = resp.json().await?;
        Ok(CheckoutSession {
            checkout_url: checkout.checkout_url,
            payment_id: checkout.payment_id,
        })
    }
}
