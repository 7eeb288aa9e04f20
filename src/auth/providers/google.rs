use async_trait::async_trait;
use serde::Deserialize;

use super::{ExternalIdentity, IdentityProvider};
use crate::config::ProviderCredentials;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleProvider {
    pub fn new(creds: ProviderCredentials) -> Self {
        Self {
            client_id: creds.client_id,
            client_secret: creds.client_secret,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn provider_id(&self) -> &str {
        "google"
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, AppError> {
        let url = reqwest::Url::parse_with_params(
            "https://accounts.google.com/o/oauth2/v2/auth",
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("access_type", "offline"),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to build Google URL: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ExternalIdentity, AppError> {
        let token: TokenResponse = self
            .http_client
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .json()
            .await?;

        let access_token = token.access_token.ok_or_else(|| {
            AppError::BadRequest(format!(
                "Google code exchange failed: {}",
                token.error_description.unwrap_or_default()
            ))
        })?;

        let info: UserInfo = self
            .http_client
            .get("https://openidconnect.googleapis.com/v1/userinfo")
            .bearer_auth(&access_token)
            .send()
            .await?
            .json()
            .await?;

        Ok(ExternalIdentity {
            provider_user_id: info.sub,
            email: info.email,
            name: info.name,
            avatar_url: info.picture,
            access_token: Some(access_token),
            refresh_token: token.refresh_token,
            expires_in_secs: token.expires_in,
        })
    }
}
