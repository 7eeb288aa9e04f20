use chrono::NaiveDateTime;
use tiberius::Row;

use crate::db::models::Session;
use crate::db::pool::Db;
use crate::error::AppError;

fn row_to_session(row: &Row) -> Session {
    Session {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        user_id: row
            .get::<&str, _>("user_id")
            .unwrap_or_default()
            .to_string(),
        token: row.get::<&str, _>("token").unwrap_or_default().to_string(),
        refresh_token: row
            .get::<&str, _>("refresh_token")
            .unwrap_or_default()
            .to_string(),
        expires_at: row
            .get::<NaiveDateTime, _>("expires_at")
            .unwrap_or_default(),
        last_activity: row
            .get::<NaiveDateTime, _>("last_activity")
            .unwrap_or_default(),
        user_agent: row.get::<&str, _>("user_agent").map(|s| s.to_string()),
        ip_address: row.get::<&str, _>("ip_address").map(|s| s.to_string()),
        created_at: row
            .get::<NaiveDateTime, _>("created_at")
            .unwrap_or_default(),
    }
}

pub async fn insert(pool: &Db, session: &Session) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "INSERT INTO sessions (id, user_id, token, refresh_token, expires_at, last_activity, user_agent, ip_address, created_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9)",
        &[&session.id.as_str(), &session.user_id.as_str(), &session.token.as_str(), &session.refresh_token.as_str(), &session.expires_at, &session.last_activity, &session.user_agent.as_deref(), &session.ip_address.as_deref(), &session.created_at],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Expired sessions are invisible here; callers cannot tell expired from
/// invalidated.
pub async fn find_by_token(
    pool: &Db,
    token_digest: &str,
    now: NaiveDateTime,
) -> Result<Option<Session>, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query(
            "SELECT * FROM sessions WHERE token = @P1 AND expires_at > @P2",
            &[&token_digest, &now],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(row.as_ref().map(row_to_session))
}

pub async fn find_by_refresh_token(
    pool: &Db,
    refresh_digest: &str,
    now: NaiveDateTime,
) -> Result<Option<Session>, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query(
            "SELECT * FROM sessions WHERE refresh_token = @P1 AND expires_at > @P2",
            &[&refresh_digest, &now],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(row.as_ref().map(row_to_session))
}

/// Replace the access-token digest in place, keeping the session id and
/// refresh token. The CASE guard keeps `expires_at` monotone: a rotation
/// may extend a login, never shorten one. Zero rows affected means the
/// session was invalidated or expired out from under the caller.
pub async fn rotate(
    pool: &Db,
    session_id: &str,
    new_token_digest: &str,
    new_expires_at: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let result = conn
        .execute(
            "UPDATE sessions SET token = @P1, last_activity = @P2, expires_at = CASE WHEN @P3 > expires_at THEN @P3 ELSE expires_at END WHERE id = @P4 AND expires_at > @P2",
            &[&new_token_digest, &now, &new_expires_at, &session_id],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if result.total() == 0 {
        return Err(AppError::SessionNotFound);
    }
    Ok(())
}

pub async fn invalidate(pool: &Db, session_id: &str) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute("DELETE FROM sessions WHERE id = @P1", &[&session_id])
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Account-level revocation: logout everywhere. Used on password change
/// and suspected compromise.
pub async fn invalidate_all(pool: &Db, user_id: &str) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute("DELETE FROM sessions WHERE user_id = @P1", &[&user_id])
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub async fn delete_expired(pool: &Db, now: NaiveDateTime) -> Result<u64, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let result = conn
        .execute("DELETE FROM sessions WHERE expires_at <= @P1", &[&now])
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(result.total())
}
