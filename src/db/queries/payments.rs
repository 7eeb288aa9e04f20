use chrono::NaiveDateTime;

use crate::db::pool::Db;
use crate::error::AppError;

/// Record a completed payment, keyed by the provider's payment id. Returns
/// `false` when the id was already recorded: the idempotency gate that
/// makes webhook replays a no-op. The conditional INSERT and the
/// affected-row check are one statement, so two concurrent deliveries of
/// the same payment cannot both grant.
pub async fn record_if_new(
    pool: &Db,
    payment_id: &str,
    user_id: &str,
    product_id: &str,
    credits: i64,
    now: NaiveDateTime,
) -> Result<bool, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let result = conn
        .execute(
            "IF NOT EXISTS (SELECT 1 FROM payments WHERE id = @P1) INSERT INTO payments (id, user_id, product_id, credits, created_at) VALUES (@P1, @P2, @P3, @P4, @P5)",
            &[&payment_id, &user_id, &product_id, &credits, &now],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(result.total() > 0)
}
