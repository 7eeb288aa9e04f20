use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, AuditEvent};
use crate::auth::cookie;
use crate::auth::middleware::{AuthenticatedUser, ClientMeta};
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::session;
use crate::db::models::{AuthToken, AuthTokenKind, User};
use crate::db::queries;
use crate::error::AppError;
use crate::AppState;

const VERIFY_TOKEN_TTL_HOURS: i64 = 24;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_at: i64,
}

// --- Handlers ---

pub async fn register(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    validate_password(&req.password)?;

    if queries::users::find_by_email(&state.db, &email)
        .await?
        .is_some()
    {
        return Err(AppError::EmailTaken);
    }

    let now = Utc::now().naive_utc();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.clone(),
        password_hash: Some(hash_password(&req.password)?),
        name: req.name,
        avatar_url: None,
        email_verified: false,
        created_at: now,
        updated_at: now,
    };
    queries::users::insert(&state.db, &user).await?;

    // New accounts start with the daily allowance only.
    queries::credits::seed_daily(&state.db, &user.id, state.config.daily_credit_allotment, now)
        .await?;

    // Verification token; delivery is the mailer's job.
    let verify_token = AuthToken {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        token: session::generate_one_time_token(),
        kind: AuthTokenKind::EmailVerification.as_str().to_string(),
        expires_at: now + Duration::hours(VERIFY_TOKEN_TTL_HOURS),
        used: false,
        created_at: now,
    };
    queries::auth_tokens::insert(&state.db, &verify_token).await?;

    let issued = session::issue(
        &state.db,
        &state.tokens,
        state.config.refresh_token_ttl_secs,
        &user,
        meta.device(),
    )
    .await?;

    audit::record(
        &state.db,
        Some(&user.id),
        &meta,
        AuditEvent::Register { email },
    )
    .await;

    Ok((
        StatusCode::CREATED,
        [(
            header::SET_COOKIE,
            cookie::refresh_cookie(&issued.refresh.token, state.config.refresh_token_ttl_secs),
        )],
        Json(TokenResponse {
            access_token: issued.access.token,
            expires_at: issued.access.expires_at,
        }),
    )
        .into_response())
}

pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let email = req.email.trim().to_lowercase();
    let now = Utc::now().naive_utc();
    let window_start = now - Duration::minutes(state.config.failed_login_window_mins);

    // Lockout check runs before any hash work.
    if let Some(ip) = meta.ip_address.as_deref() {
        let failures =
            queries::audit::count_failed_logins_by_ip(&state.db, ip, window_start).await?;
        if failures >= state.config.failed_login_limit {
            audit::record(&state.db, None, &meta, AuditEvent::LoginLockout).await;
            return Err(AppError::TooManyAttempts);
        }
    }

    let user = queries::users::find_by_email(&state.db, &email).await?;

    if let Some(ref user) = user {
        let failures =
            queries::audit::count_failed_logins_by_user(&state.db, &user.id, window_start).await?;
        if failures >= state.config.failed_login_limit {
            audit::record(&state.db, Some(&user.id), &meta, AuditEvent::LoginLockout).await;
            return Err(AppError::TooManyAttempts);
        }
    }

    // One generic failure path: the caller can never distinguish an
    // unknown account from a wrong password.
    let verified = match &user {
        Some(user) => match user.password_hash.as_deref() {
            Some(hash) => verify_password(&req.password, hash)?,
            None => false, // external-identity account, no password login
        },
        None => false,
    };

    if !verified {
        audit::record(
            &state.db,
            user.as_ref().map(|u| u.id.as_str()),
            &meta,
            AuditEvent::FailedLogin { email },
        )
        .await;
        return Err(AppError::InvalidCredentials);
    }

    let user = user.ok_or(AppError::InvalidCredentials)?;
    let issued = session::issue(
        &state.db,
        &state.tokens,
        state.config.refresh_token_ttl_secs,
        &user,
        meta.device(),
    )
    .await?;

    audit::record(&state.db, Some(&user.id), &meta, AuditEvent::Login).await;

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            cookie::refresh_cookie(&issued.refresh.token, state.config.refresh_token_ttl_secs),
        )],
        Json(TokenResponse {
            access_token: issued.access.token,
            expires_at: issued.access.expires_at,
        }),
    )
        .into_response())
}

/// Exchange the refresh cookie for a new access token. Any failure clears
/// the cookie: a refresh token that stopped working will not keep being
/// replayed by the browser.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(raw) = cookie::get_cookie(&headers, cookie::REFRESH_COOKIE_NAME) else {
        return unauthorized_with_cleared_cookie();
    };

    match session::refresh(
        &state.db,
        &state.tokens,
        state.config.refresh_token_ttl_secs,
        raw,
    )
    .await
    {
        Ok((access, _session)) => (
            StatusCode::OK,
            Json(TokenResponse {
                access_token: access.token,
                expires_at: access.expires_at,
            }),
        )
            .into_response(),
        Err(AppError::InvalidToken) | Err(AppError::SessionNotFound) | Err(AppError::Jwt(_)) => {
            unauthorized_with_cleared_cookie()
        }
        Err(e) => e.into_response(),
    }
}

fn unauthorized_with_cleared_cookie() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::SET_COOKIE, cookie::clear_refresh_cookie())],
        Json(serde_json::json!({
            "error": "invalid_token",
            "message": "Invalid or expired token",
        })),
    )
        .into_response()
}

pub async fn logout(
    user: AuthenticatedUser,
    meta: ClientMeta,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    session::revoke(&state.db, &user.session_id).await?;
    audit::record(&state.db, Some(&user.user_id), &meta, AuditEvent::Logout).await;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie::clear_refresh_cookie())],
        Json(serde_json::json!({"status": "ok"})),
    )
        .into_response())
}

/// Always answers 200: the response never reveals whether the address has
/// an account.
pub async fn password_reset_request(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = req.email.trim().to_lowercase();

    if let Some(user) = queries::users::find_by_email(&state.db, &email).await? {
        let now = Utc::now().naive_utc();
        let reset_token = AuthToken {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            token: session::generate_one_time_token(),
            kind: AuthTokenKind::PasswordReset.as_str().to_string(),
            expires_at: now + Duration::hours(RESET_TOKEN_TTL_HOURS),
            used: false,
            created_at: now,
        };
        queries::auth_tokens::insert(&state.db, &reset_token).await?;
        audit::record(
            &state.db,
            Some(&user.id),
            &meta,
            AuditEvent::PasswordResetRequest,
        )
        .await;
        tracing::debug!(user_id = %user.id, "password reset token issued");
    }

    Ok(Json(serde_json::json!({"status": "ok"})))
}

pub async fn password_reset_confirm(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> Result<Response, AppError> {
    validate_password(&req.password)?;

    let now = Utc::now().naive_utc();
    let user_id =
        queries::auth_tokens::consume(&state.db, &req.token, AuthTokenKind::PasswordReset, now)
            .await?;

    let password_hash = hash_password(&req.password)?;
    queries::users::set_password_hash(&state.db, &user_id, &password_hash, now).await?;

    // Changing the password logs out every device.
    queries::sessions::invalidate_all(&state.db, &user_id).await?;
    audit::record(&state.db, Some(&user_id), &meta, AuditEvent::PasswordChange).await;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie::clear_refresh_cookie())],
        Json(serde_json::json!({"status": "ok"})),
    )
        .into_response())
}

pub async fn verify_email(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now().naive_utc();
    let user_id = queries::auth_tokens::consume(
        &state.db,
        &req.token,
        AuthTokenKind::EmailVerification,
        now,
    )
    .await?;

    queries::users::set_email_verified(&state.db, &user_id, now).await?;
    audit::record(&state.db, Some(&user_id), &meta, AuditEvent::EmailVerified).await;

    Ok(Json(serde_json::json!({"status": "ok"})))
}
