use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::audit::{self, AuditEvent};
use crate::auth::cookie;
use crate::auth::middleware::{AuthenticatedUser, ClientMeta};
use crate::db::models::User;
use crate::db::queries;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub credits: CreditsView,
}

#[derive(Debug, Serialize)]
pub struct CreditsView {
    pub daily: i64,
    pub purchased: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

pub async fn me(
    user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let record = queries::users::find_by_id(&state.db, &user.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    // Lazy daily reset before any balance read.
    let now = Utc::now().naive_utc();
    queries::credits::check_and_reset(
        &state.db,
        &user.user_id,
        state.config.daily_credit_allotment,
        now,
    )
    .await?;
    let balance = queries::credits::balance(&state.db, &user.user_id).await?;

    Ok(Json(ProfileResponse {
        user: record,
        credits: CreditsView {
            daily: balance.daily,
            purchased: balance.purchased,
            total: balance.total(),
        },
    }))
}

pub async fn update_me(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let now = Utc::now().naive_utc();
    queries::users::update_profile(
        &state.db,
        &user.user_id,
        req.name.as_deref(),
        req.avatar_url.as_deref(),
        now,
    )
    .await?;

    let record = queries::users::find_by_id(&state.db, &user.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(record))
}

/// Explicit account deletion. Cascades everything the user owns; the
/// audit trail stays, with this event as its last entry.
pub async fn delete_me(
    user: AuthenticatedUser,
    meta: ClientMeta,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let record = queries::users::find_by_id(&state.db, &user.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    audit::record(
        &state.db,
        Some(&user.user_id),
        &meta,
        AuditEvent::AccountDeleted {
            email: record.email.clone(),
        },
    )
    .await;

    queries::users::delete_cascade(&state.db, &user.user_id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie::clear_refresh_cookie())],
        Json(serde_json::json!({"status": "ok"})),
    )
        .into_response())
}
