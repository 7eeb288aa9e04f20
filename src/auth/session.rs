//! Session lifecycle plumbing: minting a token pair, anchoring it to a
//! durable session row, rotating the access token in place, revoking.

use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::tokens::{Minted, TokenCodec, TokenType};
use crate::db::models::{Session, User};
use crate::db::pool::Db;
use crate::db::queries::sessions;
use crate::error::AppError;

/// Device metadata captured at login and kept on the session row.
#[derive(Debug, Clone, Default)]
pub struct DeviceMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: String,
    pub access: Minted,
    pub refresh: Minted,
}

/// SHA-256 digest for at-rest token storage. The store never holds a
/// usable credential.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cryptographically random state value for the OAuth round trip,
/// URL-safe since it travels as a query parameter.
pub fn generate_state_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Random single-use token for out-of-band flows (verification, reset).
pub fn generate_one_time_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Mint an access/refresh pair and persist the session that anchors it.
pub async fn issue(
    db: &Db,
    codec: &TokenCodec,
    refresh_ttl_secs: i64,
    user: &User,
    device: DeviceMeta,
) -> Result<IssuedSession, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let access = codec.mint_access(&user.id, &user.email, user.name.as_deref(), &session_id)?;
    let refresh = codec.mint_refresh(&user.id, &user.email, user.name.as_deref(), &session_id)?;

    let now = Utc::now().naive_utc();
    let session = Session {
        id: session_id.clone(),
        user_id: user.id.clone(),
        token: hash_token(&access.token),
        refresh_token: hash_token(&refresh.token),
        expires_at: now + Duration::seconds(refresh_ttl_secs),
        last_activity: now,
        user_agent: device.user_agent,
        ip_address: device.ip_address,
        created_at: now,
    };
    sessions::insert(db, &session).await?;

    Ok(IssuedSession {
        session_id,
        access,
        refresh,
    })
}

/// Exchange a refresh token for a new access token. The refresh token is
/// deliberately not rotated: the session keeps the same refresh digest for
/// its whole life, and revocation granularity comes from deleting the
/// session row. A cryptographically valid refresh token whose session was
/// invalidated on another device fails here with `SessionNotFound`, fatal
/// for this request, not retriable.
pub async fn refresh(
    db: &Db,
    codec: &TokenCodec,
    refresh_ttl_secs: i64,
    refresh_token: &str,
) -> Result<(Minted, Session), AppError> {
    let claims = codec.verify(refresh_token, TokenType::Refresh)?;

    let now = Utc::now().naive_utc();
    let session = sessions::find_by_refresh_token(db, &hash_token(refresh_token), now)
        .await?
        .ok_or(AppError::SessionNotFound)?;

    if session.id != claims.sid || session.user_id != claims.sub {
        return Err(AppError::SessionNotFound);
    }

    let access = codec.mint_access(&claims.sub, &claims.email, claims.name.as_deref(), &session.id)?;
    let new_expiry = now + Duration::seconds(refresh_ttl_secs);
    sessions::rotate(db, &session.id, &hash_token(&access.token), new_expiry, now).await?;

    Ok((access, session))
}

pub async fn revoke(db: &Db, session_id: &str) -> Result<(), AppError> {
    sessions::invalidate(db, session_id).await
}

#[cfg(test)]
mod tests {
    use super::{generate_state_token, hash_token};

    #[test]
    fn token_digest_is_stable_hex() {
        let a = hash_token("some-token");
        let b = hash_token("some-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash_token("other-token"), a);
    }

    #[test]
    fn state_tokens_are_unique() {
        assert_ne!(generate_state_token(), generate_state_token());
    }
}
