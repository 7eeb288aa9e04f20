pub mod github;
pub mod google;
#[cfg(feature = "test-providers")]
pub mod test_provider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;

/// What an external provider knows about the user after a code exchange.
/// Provider-issued tokens ride along so the link can call the provider's
/// API later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider_user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in_secs: Option<i64>,
}

/// The whole OAuth wire protocol collapses to two operations here: where
/// to send the browser, and `{code -> identity}`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider_id(&self) -> &str;
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, AppError>;
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ExternalIdentity, AppError>;
}

pub fn create_provider(
    provider_id: &str,
    config: &Config,
) -> Result<Box<dyn IdentityProvider>, AppError> {
    match provider_id {
        "github" => {
            let creds = config
                .github
                .clone()
                .ok_or(AppError::ProviderNotConfigured)?;
            Ok(Box::new(github::GitHubProvider::new(creds)))
        }
        "google" => {
            let creds = config
                .google
                .clone()
                .ok_or(AppError::ProviderNotConfigured)?;
            Ok(Box::new(google::GoogleProvider::new(creds)))
        }
        #[cfg(feature = "test-providers")]
        "test" => Ok(Box::new(test_provider::TestProvider::default())),
        _ => Err(AppError::ProviderNotSupported(provider_id.to_string())),
    }
}
