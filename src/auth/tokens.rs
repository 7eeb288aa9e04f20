use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token payload. Access tokens carry no `typ` field; refresh tokens carry
/// `typ: "refresh"`, so an access token can never be replayed as a refresh
/// token or vice versa.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String, // user ID
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub sid: String, // session ID
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "typ", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
}

impl Claims {
    fn effective_type(&self) -> TokenType {
        self.token_type.unwrap_or(TokenType::Access)
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token type")]
    WrongType,
}

impl From<VerifyError> for AppError {
    fn from(_: VerifyError) -> Self {
        // The response body stays generic regardless of which check failed.
        AppError::InvalidToken
    }
}

#[derive(Debug, Clone)]
pub struct Minted {
    pub token: String,
    pub expires_at: i64,
}

/// Mints and verifies the signed token pair. Stateless: everything here is
/// a pure function of the symmetric signing key, which is what keeps
/// per-request verification free of store lookups.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenCodec {
    pub fn new(config: &Config) -> Self {
        Self::with_secret(
            config.token_secret.as_bytes(),
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    pub fn with_secret(secret: &[u8], access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn mint_access(
        &self,
        user_id: &str,
        email: &str,
        name: Option<&str>,
        session_id: &str,
    ) -> Result<Minted, AppError> {
        self.mint(user_id, email, name, session_id, self.access_ttl_secs, None)
    }

    pub fn mint_refresh(
        &self,
        user_id: &str,
        email: &str,
        name: Option<&str>,
        session_id: &str,
    ) -> Result<Minted, AppError> {
        self.mint(
            user_id,
            email,
            name,
            session_id,
            self.refresh_ttl_secs,
            Some(TokenType::Refresh),
        )
    }

    fn mint(
        &self,
        user_id: &str,
        email: &str,
        name: Option<&str>,
        session_id: &str,
        ttl_secs: i64,
        token_type: Option<TokenType>,
    ) -> Result<Minted, AppError> {
        let now = Utc::now().timestamp();
        let expires_at = now + ttl_secs;
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: name.map(|s| s.to_string()),
            sid: session_id.to_string(),
            iat: now,
            exp: expires_at,
            token_type,
        };

        let header = Header::new(Algorithm::HS256);
        let token = encode(&header, &claims, &self.encoding_key).map_err(AppError::Jwt)?;
        Ok(Minted { token, expires_at })
    }

    /// Pure verification: signature, expiry, then the type discriminator.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, VerifyError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::InvalidSignature,
            }
        })?;

        if data.claims.effective_type() != expected {
            return Err(VerifyError::WrongType);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::with_secret(b"test-secret-key-for-testing", 900, 604800)
    }

    #[test]
    fn access_token_round_trips() {
        let c = codec();
        let minted = c
            .mint_access("u-1", "alice@test.com", Some("Alice"), "s-1")
            .unwrap();

        let claims = c.verify(&minted.token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.email, "alice@test.com");
        assert_eq!(claims.name.as_deref(), Some("Alice"));
        assert_eq!(claims.sid, "s-1");
        assert_eq!(claims.exp, minted.expires_at);
        assert_eq!(claims.token_type, None);
    }

    #[test]
    fn refresh_token_carries_discriminator() {
        let c = codec();
        let minted = c.mint_refresh("u-1", "alice@test.com", None, "s-1").unwrap();

        let claims = c.verify(&minted.token, TokenType::Refresh).unwrap();
        assert_eq!(claims.token_type, Some(TokenType::Refresh));
    }

    #[test]
    fn type_confusion_is_rejected_both_ways() {
        let c = codec();
        let access = c.mint_access("u-1", "a@test.com", None, "s-1").unwrap();
        let refresh = c.mint_refresh("u-1", "a@test.com", None, "s-1").unwrap();

        assert_eq!(
            c.verify(&access.token, TokenType::Refresh),
            Err(VerifyError::WrongType)
        );
        assert_eq!(
            c.verify(&refresh.token, TokenType::Access),
            Err(VerifyError::WrongType)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let c = TokenCodec::with_secret(b"test-secret-key-for-testing", -60, -60);
        let minted = c.mint_access("u-1", "a@test.com", None, "s-1").unwrap();

        assert_eq!(
            codec().verify(&minted.token, TokenType::Access),
            Err(VerifyError::Expired)
        );
    }

    #[test]
    fn wrong_secret_is_an_invalid_signature() {
        let minted = codec().mint_access("u-1", "a@test.com", None, "s-1").unwrap();
        let other = TokenCodec::with_secret(b"a-different-secret", 900, 604800);

        assert_eq!(
            other.verify(&minted.token, TokenType::Access),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn tampered_token_is_an_invalid_signature() {
        let c = codec();
        let minted = c.mint_access("u-1", "a@test.com", None, "s-1").unwrap();
        let mut tampered = minted.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert_eq!(
            c.verify(&tampered, TokenType::Access),
            Err(VerifyError::InvalidSignature)
        );
    }
}
