use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::auth::tokens::{Claims, TokenType};
use crate::error::AppError;

/// Extracts the authenticated user from a Bearer token. Verification is a
/// pure codec operation; no store round trip happens per request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub session_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync + AsRef<crate::AppState>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state: &crate::AppState = state.as_ref();

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let claims: Claims = app_state.tokens.verify(token, TokenType::Access)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            session_id: claims.sid,
        })
    }
}

/// Caller identity as seen by the transport: IP and user agent. Never
/// rejects; both fields degrade to `None`.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: client_ip(headers),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
        }
    }

    pub fn device(&self) -> crate::auth::session::DeviceMeta {
        crate::auth::session::DeviceMeta {
            user_agent: self.user_agent.clone(),
            ip_address: self.ip_address.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientMeta::from_headers(&parts.headers))
    }
}

/// Client IP from X-Forwarded-For (first hop) or X-Real-IP.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::client_ip;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), Some("203.0.113.9".to_string()));
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_ip(&headers), Some("198.51.100.4".to_string()));
    }

    #[test]
    fn no_headers_means_no_ip() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
