use chrono::NaiveDateTime;
use tiberius::Row;

use crate::db::models::User;
use crate::db::pool::Db;
use crate::error::AppError;

fn row_to_user(row: &Row) -> User {
    User {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        email: row.get::<&str, _>("email").unwrap_or_default().to_string(),
        password_hash: row.get::<&str, _>("password_hash").map(|s| s.to_string()),
        name: row.get::<&str, _>("name").map(|s| s.to_string()),
        avatar_url: row.get::<&str, _>("avatar_url").map(|s| s.to_string()),
        email_verified: row.get::<bool, _>("email_verified").unwrap_or_default(),
        created_at: row
            .get::<NaiveDateTime, _>("created_at")
            .unwrap_or_default(),
        updated_at: row
            .get::<NaiveDateTime, _>("updated_at")
            .unwrap_or_default(),
    }
}

pub async fn find_by_id(pool: &Db, id: &str) -> Result<Option<User>, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query("SELECT * FROM users WHERE id = @P1", &[&id])
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(row.as_ref().map(row_to_user))
}

/// Email lookup is case-insensitive; addresses are stored lowercased.
pub async fn find_by_email(pool: &Db, email: &str) -> Result<Option<User>, AppError> {
    let email = email.trim().to_lowercase();
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query("SELECT * FROM users WHERE email = @P1", &[&email.as_str()])
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(row.as_ref().map(row_to_user))
}

pub async fn insert(pool: &Db, user: &User) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "INSERT INTO users (id, email, password_hash, name, avatar_url, email_verified, created_at, updated_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8)",
        &[&user.id.as_str(), &user.email.as_str(), &user.password_hash.as_deref(), &user.name.as_deref(), &user.avatar_url.as_deref(), &user.email_verified, &user.created_at, &user.updated_at],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub async fn update_profile(
    pool: &Db,
    id: &str,
    name: Option<&str>,
    avatar_url: Option<&str>,
    updated_at: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "UPDATE users SET name = COALESCE(@P1, name), avatar_url = COALESCE(@P2, avatar_url), updated_at = @P3 WHERE id = @P4",
        &[&name, &avatar_url, &updated_at, &id],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub async fn set_password_hash(
    pool: &Db,
    id: &str,
    password_hash: &str,
    updated_at: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "UPDATE users SET password_hash = @P1, updated_at = @P2 WHERE id = @P3",
        &[&password_hash, &updated_at, &id],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub async fn set_email_verified(
    pool: &Db,
    id: &str,
    updated_at: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "UPDATE users SET email_verified = 1, updated_at = @P1 WHERE id = @P2",
        &[&updated_at, &id],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Account deletion. Removes everything the user owns; the audit trail is
/// deliberately left in place for post-deletion forensics.
pub async fn delete_cascade(pool: &Db, id: &str) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    for stmt in [
        "DELETE FROM sessions WHERE user_id = @P1",
        "DELETE FROM oauth_accounts WHERE user_id = @P1",
        "DELETE FROM credit_usage WHERE user_id = @P1",
        "DELETE FROM credits WHERE user_id = @P1",
        "DELETE FROM auth_tokens WHERE user_id = @P1",
        "DELETE FROM users WHERE id = @P1",
    ] {
        conn.execute(stmt, &[&id])
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
    }
    Ok(())
}
