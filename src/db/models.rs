use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// One row per active login. `token` and `refresh_token` hold SHA-256
/// digests of the issued JWTs, never the raw strings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub refresh_token: String,
    pub expires_at: NaiveDateTime,
    pub last_activity: NaiveDateTime,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthAccount {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_user_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The two pools a user's spendable total is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditKind {
    /// Renewable allowance, reset to a fixed allotment at UTC midnight.
    Daily,
    /// Paid balance. No reset date; only grows via top-up, shrinks via use.
    Purchased,
}

impl CreditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditKind::Daily => "daily",
            CreditKind::Purchased => "purchased",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "daily" => Some(CreditKind::Daily),
            "purchased" => Some(CreditKind::Purchased),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: String,
    pub user_id: String,
    pub credit_type: CreditKind,
    pub amount: i64,
    pub reset_date: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreditUsageRecord {
    pub id: String,
    pub user_id: String,
    pub credits_deducted: i64,
    pub credit_type_used: CreditKind,
    pub action_type: String,
    pub metadata: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub user_id: Option<String>,
    pub event_type: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Single-use token for out-of-band flows. `used` is set exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthTokenKind {
    EmailVerification,
    PasswordReset,
}

impl AuthTokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthTokenKind::EmailVerification => "email_verification",
            AuthTokenKind::PasswordReset => "password_reset",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub kind: String,
    pub expires_at: NaiveDateTime,
    pub used: bool,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::CreditKind;

    #[test]
    fn credit_kind_round_trips() {
        for kind in [CreditKind::Daily, CreditKind::Purchased] {
            assert_eq!(CreditKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CreditKind::parse("weekly"), None);
    }
}
