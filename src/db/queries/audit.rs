use chrono::NaiveDateTime;

use crate::db::models::AuditLogEntry;
use crate::db::pool::Db;
use crate::error::AppError;

pub async fn insert(pool: &Db, entry: &AuditLogEntry) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "INSERT INTO audit_logs (id, user_id, event_type, ip_address, user_agent, metadata, created_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7)",
        &[&entry.id.as_str(), &entry.user_id.as_deref(), &entry.event_type.as_str(), &entry.ip_address.as_deref(), &entry.user_agent.as_deref(), &entry.metadata.as_deref(), &entry.created_at],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub async fn count_failed_logins_by_ip(
    pool: &Db,
    ip_address: &str,
    since: NaiveDateTime,
) -> Result<i64, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query(
            "SELECT COUNT(*) AS cnt FROM audit_logs WHERE event_type = 'failed_login' AND ip_address = @P1 AND created_at >= @P2",
            &[&ip_address, &since],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(row
        .map(|r| r.get::<i32, _>("cnt").unwrap_or(0) as i64)
        .unwrap_or(0))
}

pub async fn count_failed_logins_by_user(
    pool: &Db,
    user_id: &str,
    since: NaiveDateTime,
) -> Result<i64, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query(
            "SELECT COUNT(*) AS cnt FROM audit_logs WHERE event_type = 'failed_login' AND user_id = @P1 AND created_at >= @P2",
            &[&user_id, &since],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(row
        .map(|r| r.get::<i32, _>("cnt").unwrap_or(0) as i64)
        .unwrap_or(0))
}
