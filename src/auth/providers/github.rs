use async_trait::async_trait;
use serde::Deserialize;

use super::{ExternalIdentity, IdentityProvider};
use crate::config::ProviderCredentials;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct GitHubProvider {
    client_id: String,
    client_secret: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl GitHubProvider {
    pub fn new(creds: ProviderCredentials) -> Self {
        Self {
            client_id: creds.client_id,
            client_secret: creds.client_secret,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn provider_id(&self) -> &str {
        "github"
    }

    fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, AppError> {
        let url = reqwest::Url::parse_with_params(
            "https://github.com/login/oauth/authorize",
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", "read:user user:email"),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to build GitHub URL: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ExternalIdentity, AppError> {
        let token: AccessTokenResponse = self
            .http_client
            .post("https://github.com/login/oauth/access_token")
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?
            .json()
            .await?;

        let access_token = token.access_token.ok_or_else(|| {
            AppError::BadRequest(format!(
                "GitHub code exchange failed: {}",
                token.error_description.unwrap_or_default()
            ))
        })?;

        let user: GitHubUser = self
            .http_client
            .get("https://api.github.com/user")
            .header(reqwest::header::USER_AGENT, "account-service")
            .bearer_auth(&access_token)
            .send()
            .await?
            .json()
            .await?;

        // The profile email is often withheld; the emails endpoint is
        // authoritative for the primary verified address.
        let email = match user.email {
            Some(email) => Some(email),
            None => {
                let emails: Vec<GitHubEmail> = self
                    .http_client
                    .get("https://api.github.com/user/emails")
                    .header(reqwest::header::USER_AGENT, "account-service")
                    .bearer_auth(&access_token)
                    .send()
                    .await?
                    .json()
                    .await
                    .unwrap_or_default();
                emails
                    .into_iter()
                    .find(|e| e.primary && e.verified)
                    .map(|e| e.email)
            }
        };

        Ok(ExternalIdentity {
            provider_user_id: user.id.to_string(),
            email,
            name: user.name.or(Some(user.login)),
            avatar_url: user.avatar_url,
            access_token: Some(access_token),
            refresh_token: None,
            expires_in_secs: None,
        })
    }
}
