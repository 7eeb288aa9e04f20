use chrono::NaiveDateTime;
use tiberius::Row;

use crate::db::models::OAuthAccount;
use crate::db::pool::Db;
use crate::error::AppError;

fn row_to_account(row: &Row) -> OAuthAccount {
    OAuthAccount {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        user_id: row
            .get::<&str, _>("user_id")
            .unwrap_or_default()
            .to_string(),
        provider: row
            .get::<&str, _>("provider")
            .unwrap_or_default()
            .to_string(),
        provider_user_id: row
            .get::<&str, _>("provider_user_id")
            .unwrap_or_default()
            .to_string(),
        access_token: row.get::<&str, _>("access_token").map(|s| s.to_string()),
        refresh_token: row.get::<&str, _>("refresh_token").map(|s| s.to_string()),
        expires_at: row.get::<NaiveDateTime, _>("expires_at"),
        created_at: row
            .get::<NaiveDateTime, _>("created_at")
            .unwrap_or_default(),
        updated_at: row
            .get::<NaiveDateTime, _>("updated_at")
            .unwrap_or_default(),
    }
}

pub async fn find_by_provider_user(
    pool: &Db,
    provider: &str,
    provider_user_id: &str,
) -> Result<Option<OAuthAccount>, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query(
            "SELECT * FROM oauth_accounts WHERE provider = @P1 AND provider_user_id = @P2",
            &[&provider, &provider_user_id],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(row.as_ref().map(row_to_account))
}

pub async fn insert(pool: &Db, account: &OAuthAccount) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "INSERT INTO oauth_accounts (id, user_id, provider, provider_user_id, access_token, refresh_token, expires_at, created_at, updated_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9)",
        &[&account.id.as_str(), &account.user_id.as_str(), &account.provider.as_str(), &account.provider_user_id.as_str(), &account.access_token.as_deref(), &account.refresh_token.as_deref(), &account.expires_at, &account.created_at, &account.updated_at],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Refresh the provider-issued tokens on every external login.
pub async fn update_tokens(
    pool: &Db,
    id: &str,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
    expires_at: Option<NaiveDateTime>,
    updated_at: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "UPDATE oauth_accounts SET access_token = @P1, refresh_token = COALESCE(@P2, refresh_token), expires_at = @P3, updated_at = @P4 WHERE id = @P5",
        &[&access_token, &refresh_token, &expires_at, &updated_at, &id],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
