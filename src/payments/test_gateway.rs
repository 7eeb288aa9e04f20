use async_trait::async_trait;
use uuid::Uuid;

use super::{CheckoutSession, PaymentGateway, Product};
use crate::error::AppError;

/// In-memory gateway for integration tests: every checkout "succeeds"
/// with a unique payment id and a fake URL.
#[derive(Debug, Default)]
pub struct TestGateway;

#[async_trait]
impl PaymentGateway for TestGateway {
    async fn create_checkout(
        &self,
        user_id: &str,
        product: &Product,
    ) -> Result<CheckoutSession, AppError> {
        let payment_id = format!("test-pay-{}", Uuid::new_v4());
        Ok(CheckoutSession {
            checkout_url: format!(
                "https://pay.test/checkout/{payment_id}?user={user_id}&product={}",
                product.id
            ),
            payment_id,
        })
    }
}
