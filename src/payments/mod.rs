pub mod gateway;
#[cfg(feature = "test-providers")]
pub mod test_gateway;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::AppError;

/// Purchasable credit bundles. A closed catalog: the webhook grants only
/// what one of these rows says, never an amount the payload invents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    pub id: &'static str,
    pub credits: i64,
    pub price_cents: i64,
}

pub const PRODUCTS: &[Product] = &[
    Product {
        id: "credits_100",
        credits: 100,
        price_cents: 500,
    },
    Product {
        id: "credits_500",
        credits: 500,
        price_cents: 2000,
    },
    Product {
        id: "credits_1500",
        credits: 1500,
        price_cents: 5000,
    },
];

pub fn find_product(id: &str) -> Option<&'static Product> {
    PRODUCTS.iter().find(|p| p.id == id)
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub payment_id: String,
}

/// The payment provider collapses to one operation here: turn a (user,
/// product) pair into a checkout the browser can be sent to. Everything
/// after that arrives on the webhook.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(
        &self,
        user_id: &str,
        product: &Product,
    ) -> Result<CheckoutSession, AppError>;
}

pub fn create_gateway(config: &Config) -> Result<Box<dyn PaymentGateway>, AppError> {
    match &config.payments {
        Some(payments) => Ok(Box::new(gateway::HttpGateway::new(payments.clone()))),
        #[cfg(feature = "test-providers")]
        None => Ok(Box::new(test_gateway::TestGateway)),
        #[cfg(not(feature = "test-providers"))]
        None => Err(AppError::PaymentsNotConfigured),
    }
}

/// Webhook authenticity: the provider sends `hex(sha256(secret || body))`.
/// Digests of both sides are compared, so the comparison cost does not
/// depend on how much of the signature matches.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body);
    let expected = hasher.finalize();

    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    Sha256::digest(expected) == Sha256::digest(provided)
}

/// Signature for outgoing verification in tests and the test gateway.
pub fn sign_webhook_body(secret: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body);
    hex::encode(hasher.finalize())
}
