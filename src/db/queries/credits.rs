use chrono::{NaiveDateTime, NaiveTime};
use serde_json::json;
use tiberius::Row;
use uuid::Uuid;

use crate::db::models::{CreditEntry, CreditKind, CreditUsageRecord};
use crate::db::pool::Db;
use crate::error::AppError;

/// Both pools, read in one pass so the two numbers are never torn across
/// round trips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Balance {
    pub daily: i64,
    pub purchased: i64,
}

impl Balance {
    pub fn total(&self) -> i64 {
        self.daily + self.purchased
    }
}

/// What a deduction consumed credits for. Closed set; new actions are a
/// compile-time change, not a runtime discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UsageAction {
    ChatMessage { conversation_id: Option<String> },
    CodeGeneration { project_id: Option<String> },
}

impl UsageAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            UsageAction::ChatMessage { .. } => "chat_message",
            UsageAction::CodeGeneration { .. } => "code_generation",
        }
    }

    pub fn metadata(&self) -> Option<String> {
        match self {
            UsageAction::ChatMessage { conversation_id } => conversation_id
                .as_ref()
                .map(|id| json!({ "conversation_id": id }).to_string()),
            UsageAction::CodeGeneration { project_id } => project_id
                .as_ref()
                .map(|id| json!({ "project_id": id }).to_string()),
        }
    }
}

/// Split a deduction across the pools, purchased first. Daily resets
/// anyway; the paid balance is spent before the use-it-or-lose-it one.
/// `None` means the total cannot cover `n` and nothing should be touched.
pub fn plan_deduction(purchased: i64, daily: i64, n: i64) -> Option<(i64, i64)> {
    if n <= 0 || purchased + daily < n {
        return None;
    }
    let from_purchased = purchased.min(n);
    Some((from_purchased, n - from_purchased))
}

pub fn next_utc_midnight(now: NaiveDateTime) -> NaiveDateTime {
    let tomorrow = now.date().succ_opt().unwrap_or(now.date());
    NaiveDateTime::new(tomorrow, NaiveTime::MIN)
}

/// Create the daily pool for a new user. A no-op if the row already
/// exists, so double registration never yields a second allowance.
pub async fn seed_daily(
    pool: &Db,
    user_id: &str,
    allotment: i64,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let id = Uuid::new_v4().to_string();
    let reset_date = next_utc_midnight(now);
    conn.execute(
        "IF NOT EXISTS (SELECT 1 FROM credits WHERE user_id = @P2 AND credit_type = 'daily') INSERT INTO credits (id, user_id, credit_type, amount, reset_date) VALUES (@P1, @P2, 'daily', @P3, @P4)",
        &[&id.as_str(), &user_id, &allotment, &reset_date],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

fn row_to_entry(row: &Row) -> CreditEntry {
    CreditEntry {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        user_id: row
            .get::<&str, _>("user_id")
            .unwrap_or_default()
            .to_string(),
        credit_type: row
            .get::<&str, _>("credit_type")
            .and_then(CreditKind::parse)
            .unwrap_or(CreditKind::Daily),
        amount: row.get::<i64, _>("amount").unwrap_or_default(),
        reset_date: row.get::<NaiveDateTime, _>("reset_date"),
    }
}

/// Both rows of a user's ledger in one query.
pub async fn entries(pool: &Db, user_id: &str) -> Result<Vec<CreditEntry>, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let rows = conn
        .query("SELECT * FROM credits WHERE user_id = @P1", &[&user_id])
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_first_result()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(rows.iter().map(row_to_entry).collect())
}

/// Read both pools in a single pass. A user with no credit rows at all
/// was never seeded, which means the user does not exist here.
pub async fn balance(pool: &Db, user_id: &str) -> Result<Balance, AppError> {
    let entries = entries(pool, user_id).await?;
    if entries.is_empty() {
        return Err(AppError::UserNotFound);
    }

    let mut bal = Balance::default();
    for entry in entries {
        match entry.credit_type {
            CreditKind::Daily => bal.daily = entry.amount,
            CreditKind::Purchased => bal.purchased = entry.amount,
        }
    }
    Ok(bal)
}

pub async fn has_credits(pool: &Db, user_id: &str, n: i64) -> Result<bool, AppError> {
    Ok(balance(pool, user_id).await?.total() >= n)
}

/// Restore the daily pool to the fixed allotment and advance the reset
/// boundary to the next UTC midnight. Setting to a fixed value makes this
/// idempotent within a day.
pub async fn reset_daily(
    pool: &Db,
    user_id: &str,
    allotment: i64,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let reset_date = next_utc_midnight(now);
    let result = conn
        .execute(
            "UPDATE credits SET amount = @P1, reset_date = @P2 WHERE user_id = @P3 AND credit_type = 'daily'",
            &[&allotment, &reset_date, &user_id],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if result.total() == 0 {
        return Err(AppError::UserNotFound);
    }
    Ok(())
}

/// Lazy reset: applied on the next access after the boundary, not by a
/// background clock. Every balance-affecting entry point must call this
/// before reading or deducting.
pub async fn check_and_reset(
    pool: &Db,
    user_id: &str,
    allotment: i64,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let row = conn
        .query(
            "SELECT reset_date FROM credits WHERE user_id = @P1 AND credit_type = 'daily'",
            &[&user_id],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_row()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let Some(row) = row else {
        return Err(AppError::UserNotFound);
    };
    drop(conn);

    let due = row
        .get::<NaiveDateTime, _>("reset_date")
        .map(|reset| reset <= now)
        .unwrap_or(true);
    if due {
        reset_daily(pool, user_id, allotment, now).await?;
    }
    Ok(())
}

/// All-or-nothing deduction, purchased pool first. Sufficiency is enforced
/// by the store itself: each decrement is a single conditional UPDATE
/// guarded on `amount >= n`, and the affected-row count decides success.
/// Two concurrent deductions can both pass the initial read, but only the
/// one whose UPDATE lands first wins; the loser reports `false` with
/// nothing mutated.
pub async fn deduct(
    pool: &Db,
    user_id: &str,
    n: i64,
    action: &UsageAction,
    now: NaiveDateTime,
) -> Result<bool, AppError> {
    let bal = balance(pool, user_id).await?;
    let Some((from_purchased, from_daily)) = plan_deduction(bal.purchased, bal.daily, n) else {
        return Ok(false);
    };

    if from_purchased > 0 && !try_decrement(pool, user_id, CreditKind::Purchased, from_purchased).await? {
        return Ok(false);
    }
    if from_daily > 0 && !try_decrement(pool, user_id, CreditKind::Daily, from_daily).await? {
        // The daily pool shrank between the read and the write. Put the
        // purchased decrement back so the deduction stays all-or-nothing.
        if from_purchased > 0 {
            increment(pool, user_id, CreditKind::Purchased, from_purchased).await?;
        }
        return Ok(false);
    }

    if from_purchased > 0 {
        record_usage(pool, user_id, from_purchased, CreditKind::Purchased, action, now).await?;
    }
    if from_daily > 0 {
        record_usage(pool, user_id, from_daily, CreditKind::Daily, action, now).await?;
    }
    Ok(true)
}

async fn try_decrement(
    pool: &Db,
    user_id: &str,
    kind: CreditKind,
    n: i64,
) -> Result<bool, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let result = conn
        .execute(
            "UPDATE credits SET amount = amount - @P1 WHERE user_id = @P2 AND credit_type = @P3 AND amount >= @P1",
            &[&n, &user_id, &kind.as_str()],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(result.total() > 0)
}

async fn increment(pool: &Db, user_id: &str, kind: CreditKind, n: i64) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    conn.execute(
        "UPDATE credits SET amount = amount + @P1 WHERE user_id = @P2 AND credit_type = @P3",
        &[&n, &user_id, &kind.as_str()],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Top up the paid pool, creating the row on first purchase. If the
/// insert loses to a concurrent first purchase on the (user_id,
/// credit_type) unique key, the increment is retried against the row the
/// winner created.
pub async fn add_purchased(pool: &Db, user_id: &str, n: i64) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    const INCREMENT: &str =
        "UPDATE credits SET amount = amount + @P1 WHERE user_id = @P2 AND credit_type = 'purchased'";

    let result = conn
        .execute(INCREMENT, &[&n, &user_id])
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if result.total() > 0 {
        return Ok(());
    }

    let id = Uuid::new_v4().to_string();
    let inserted = conn
        .execute(
            "INSERT INTO credits (id, user_id, credit_type, amount, reset_date) VALUES (@P1, @P2, 'purchased', @P3, NULL)",
            &[&id.as_str(), &user_id, &n],
        )
        .await;

    if inserted.is_err() {
        let retry = conn
            .execute(INCREMENT, &[&n, &user_id])
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if retry.total() == 0 {
            return Err(AppError::Database(
                "purchased credit row unavailable after insert conflict".to_string(),
            ));
        }
    }
    Ok(())
}

async fn record_usage(
    pool: &Db,
    user_id: &str,
    deducted: i64,
    kind: CreditKind,
    action: &UsageAction,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let id = Uuid::new_v4().to_string();
    let metadata = action.metadata();
    conn.execute(
        "INSERT INTO credit_usage (id, user_id, credits_deducted, credit_type_used, action_type, metadata, created_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7)",
        &[&id.as_str(), &user_id, &deducted, &kind.as_str(), &action.action_type(), &metadata.as_deref(), &now],
    )
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

fn row_to_usage(row: &Row) -> CreditUsageRecord {
    CreditUsageRecord {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        user_id: row
            .get::<&str, _>("user_id")
            .unwrap_or_default()
            .to_string(),
        credits_deducted: row.get::<i64, _>("credits_deducted").unwrap_or_default(),
        credit_type_used: row
            .get::<&str, _>("credit_type_used")
            .and_then(CreditKind::parse)
            .unwrap_or(CreditKind::Daily),
        action_type: row
            .get::<&str, _>("action_type")
            .unwrap_or_default()
            .to_string(),
        metadata: row.get::<&str, _>("metadata").map(|s| s.to_string()),
        created_at: row
            .get::<NaiveDateTime, _>("created_at")
            .unwrap_or_default(),
    }
}

pub async fn list_usage(
    pool: &Db,
    user_id: &str,
    limit: i64,
) -> Result<Vec<CreditUsageRecord>, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let rows = conn
        .query(
            "SELECT TOP (@P2) * FROM credit_usage WHERE user_id = @P1 ORDER BY created_at DESC",
            &[&user_id, &limit],
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .into_first_result()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(rows.iter().map(row_to_usage).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn plan_prefers_purchased() {
        assert_eq!(plan_deduction(100, 3, 1), Some((1, 0)));
        assert_eq!(plan_deduction(100, 3, 100), Some((100, 0)));
    }

    #[test]
    fn plan_spans_pools_when_purchased_runs_out() {
        assert_eq!(plan_deduction(2, 3, 4), Some((2, 2)));
        assert_eq!(plan_deduction(0, 5, 5), Some((0, 5)));
        assert_eq!(plan_deduction(2, 3, 5), Some((2, 3)));
    }

    #[test]
    fn plan_rejects_insufficient_totals() {
        assert_eq!(plan_deduction(2, 3, 6), None);
        assert_eq!(plan_deduction(0, 0, 1), None);
    }

    #[test]
    fn plan_rejects_non_positive_amounts() {
        assert_eq!(plan_deduction(10, 10, 0), None);
        assert_eq!(plan_deduction(10, 10, -3), None);
    }

    #[test]
    fn midnight_advances_to_next_day() {
        let now = NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(13, 45, 12)
            .unwrap();
        let next = next_utc_midnight(now);
        assert_eq!(
            next,
            NaiveDate::from_ymd_opt(2026, 8, 8)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn midnight_from_midnight_is_the_following_day() {
        let now = NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            next_utc_midnight(now),
            NaiveDate::from_ymd_opt(2026, 8, 8)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn usage_action_metadata_is_typed() {
        let action = UsageAction::ChatMessage {
            conversation_id: Some("c-123".to_string()),
        };
        assert_eq!(action.action_type(), "chat_message");
        let meta: serde_json::Value =
            serde_json::from_str(&action.metadata().unwrap()).unwrap();
        assert_eq!(meta["conversation_id"], "c-123");

        let bare = UsageAction::CodeGeneration { project_id: None };
        assert_eq!(bare.metadata(), None);
    }
}
