use chrono::NaiveDateTime;

use crate::db::models::{AuthToken, AuthTokenKind};
use crate::db::pool::Db;
use crate::error::AppError;

pub async fn insert(pool: &Db, token: &AuthToken) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "INSERT INTO auth_tokens (id, user_id, token, kind, expires_at, used, created_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7)",
        &[&token.id.as_str(), &token.user_id.as_str(), &token.token.as_str(), &token.kind.as_str(), &token.expires_at, &token.used, &token.created_at],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Consume a single-use token: flip `used` exactly once and return the
/// owning user. The conditional UPDATE guarded on `used = 0` is what makes
/// a replayed token fail even when two requests race on it.
pub async fn consume(
    pool: &Db,
    token: &str,
    kind: AuthTokenKind,
    now: NaiveDateTime,
) -> Result<String, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query(
            "SELECT user_id FROM auth_tokens WHERE token = @P1 AND kind = @P2 AND expires_at > @P3",
            &[&token, &kind.as_str(), &now],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let user_id = row
        .and_then(|r| r.get::<&str, _>("user_id").map(|s| s.to_string()))
        .ok_or(AppError::InvalidToken)?;

    let result = conn
        .execute(
            "UPDATE auth_tokens SET used = 1 WHERE token = @P1 AND used = 0",
            &[&token],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if result.total() == 0 {
        // Already spent by an earlier request.
        return Err(AppError::InvalidToken);
    }

    Ok(user_id)
}
