use async_trait::async_trait;

use super::{ExternalIdentity, IdentityProvider};
use crate::error::AppError;

/// Deterministic provider for integration tests: the authorization code
/// doubles as the account name, so `code=alice` logs in `alice@test.local`.
#[derive(Debug, Default)]
pub struct TestProvider;

#[async_trait]
impl IdentityProvider for TestProvider {
    fn provider_id(&self) -> &str {
        "test"
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, AppError> {
        Ok(format!(
            "https://provider.test/authorize?redirect_uri={redirect_uri}&state={state}"
        ))
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<ExternalIdentity, AppError> {
        if code.is_empty() || code == "invalid" {
            return Err(AppError::BadRequest("invalid authorization code".to_string()));
        }
        Ok(ExternalIdentity {
            provider_user_id: format!("test-{code}"),
            email: Some(format!("{code}@test.local")),
            name: Some(code.to_string()),
            avatar_url: None,
            access_token: Some(format!("test-access-{code}")),
            refresh_token: None,
            expires_in_secs: None,
        })
    }
}
