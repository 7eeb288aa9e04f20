//! Append-only security event log. Recording never fails the operation
//! that triggered it; a broken audit write is reported out-of-band.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::middleware::ClientMeta;
use crate::db::models::AuditLogEntry;
use crate::db::pool::Db;
use crate::db::queries;

/// Closed set of security-relevant events. Adding a kind is a compile-time
/// change; so is the shape of its metadata.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    Register { email: String },
    Login,
    FailedLogin { email: String },
    LoginLockout,
    Logout,
    PasswordResetRequest,
    PasswordChange,
    EmailVerified,
    CreditPurchase { payment_id: String, credits: i64 },
    CreditsExhausted { action: &'static str },
    AccountDeleted { email: String },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::Register { .. } => "register",
            AuditEvent::Login => "login",
            AuditEvent::FailedLogin { .. } => "failed_login",
            AuditEvent::LoginLockout => "login_lockout",
            AuditEvent::Logout => "logout",
            AuditEvent::PasswordResetRequest => "password_reset_request",
            AuditEvent::PasswordChange => "password_change",
            AuditEvent::EmailVerified => "email_verified",
            AuditEvent::CreditPurchase { .. } => "credit_purchase",
            AuditEvent::CreditsExhausted { .. } => "credits_exhausted",
            AuditEvent::AccountDeleted { .. } => "account_deleted",
        }
    }

    pub fn metadata(&self) -> Option<String> {
        match self {
            AuditEvent::Register { email } => Some(json!({ "email": email }).to_string()),
            AuditEvent::FailedLogin { email } => Some(json!({ "email": email }).to_string()),
            AuditEvent::CreditPurchase {
                payment_id,
                credits,
            } => Some(json!({ "payment_id": payment_id, "credits": credits }).to_string()),
            AuditEvent::CreditsExhausted { action } => {
                Some(json!({ "action": action }).to_string())
            }
            AuditEvent::AccountDeleted { email } => Some(json!({ "email": email }).to_string()),
            AuditEvent::Login
            | AuditEvent::LoginLockout
            | AuditEvent::Logout
            | AuditEvent::PasswordResetRequest
            | AuditEvent::PasswordChange
            | AuditEvent::EmailVerified => None,
        }
    }
}

/// Append an event. Failures are swallowed after logging; an audit outage
/// must not turn a successful login into a 500.
pub async fn record(db: &Db, user_id: Option<&str>, meta: &ClientMeta, event: AuditEvent) {
    let entry = AuditLogEntry {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.map(|s| s.to_string()),
        event_type: event.event_type().to_string(),
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
        metadata: event.metadata(),
        created_at: Utc::now().naive_utc(),
    };
    if let Err(e) = queries::audit::insert(db, &entry).await {
        tracing::warn!(event = entry.event_type, "failed to write audit log: {e}");
    }
}
