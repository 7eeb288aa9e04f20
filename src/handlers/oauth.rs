use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::audit::{self, AuditEvent};
use crate::auth::cookie;
use crate::auth::middleware::ClientMeta;
use crate::auth::providers;
use crate::auth::session;
use crate::db::models::{OAuthAccount, User};
use crate::db::queries;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

fn callback_uri(config: &crate::config::Config, provider_id: &str) -> String {
    format!(
        "{}/auth/oauth/callback/{provider_id}",
        config.oauth_redirect_base.trim_end_matches('/')
    )
}

/// Send the browser to the provider. The state value rides in a scoped
/// cookie and must come back unchanged on the callback.
pub async fn start(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> Result<Response, AppError> {
    let provider = providers::create_provider(&provider_id, &state.config)?;
    let state_token = session::generate_state_token();
    let redirect_uri = callback_uri(&state.config, &provider_id);
    let url = provider.authorize_url(&redirect_uri, &state_token)?;

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie::oauth_state_cookie(&state_token))]),
        Redirect::temporary(&url),
    )
        .into_response())
}

/// Complete the external login: verify state, exchange the code, find or
/// create the linked account and user, and hand the browser back to the
/// frontend with a fresh session.
pub async fn callback(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let meta = ClientMeta::from_headers(&headers);

    let expected_state = cookie::get_cookie(&headers, cookie::OAUTH_STATE_COOKIE_NAME)
        .ok_or_else(|| AppError::BadRequest("Missing OAuth state".to_string()))?;
    if expected_state != query.state {
        return Err(AppError::BadRequest("OAuth state mismatch".to_string()));
    }

    let provider = providers::create_provider(&provider_id, &state.config)?;
    let redirect_uri = callback_uri(&state.config, &provider_id);
    let identity = provider.exchange_code(&query.code, &redirect_uri).await?;

    let now = Utc::now().naive_utc();
    let provider_expiry = identity.expires_in_secs.map(|s| now + Duration::seconds(s));

    let existing = queries::oauth_accounts::find_by_provider_user(
        &state.db,
        &provider_id,
        &identity.provider_user_id,
    )
    .await?;

    let (user, first_login) = match existing {
        Some(account) => {
            queries::oauth_accounts::update_tokens(
                &state.db,
                &account.id,
                identity.access_token.as_deref(),
                identity.refresh_token.as_deref(),
                provider_expiry,
                now,
            )
            .await?;
            let user = queries::users::find_by_id(&state.db, &account.user_id)
                .await?
                .ok_or(AppError::UserNotFound)?;
            (user, false)
        }
        None => {
            let email = identity
                .email
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("Provider did not supply an email address".to_string())
                })?;

            // Same email, same account: a provider login links onto an
            // existing user rather than forking a duplicate. Externally
            // authenticated users never get a password.
            let (user, created) = match queries::users::find_by_email(&state.db, &email).await? {
                Some(user) => (user, false),
                None => {
                    let user = User {
                        id: Uuid::new_v4().to_string(),
                        email,
                        password_hash: None,
                        name: identity.name.clone(),
                        avatar_url: identity.avatar_url.clone(),
                        email_verified: true,
                        created_at: now,
                        updated_at: now,
                    };
                    queries::users::insert(&state.db, &user).await?;
                    queries::credits::seed_daily(
                        &state.db,
                        &user.id,
                        state.config.daily_credit_allotment,
                        now,
                    )
                    .await?;
                    (user, true)
                }
            };

            let account = OAuthAccount {
                id: Uuid::new_v4().to_string(),
                user_id: user.id.clone(),
                provider: provider_id.clone(),
                provider_user_id: identity.provider_user_id.clone(),
                access_token: identity.access_token.clone(),
                refresh_token: identity.refresh_token.clone(),
                expires_at: provider_expiry,
                created_at: now,
                updated_at: now,
            };
            queries::oauth_accounts::insert(&state.db, &account).await?;
            (user, created)
        }
    };

    let issued = session::issue(
        &state.db,
        &state.tokens,
        state.config.refresh_token_ttl_secs,
        &user,
        meta.device(),
    )
    .await?;

    let event = if first_login {
        AuditEvent::Register {
            email: user.email.clone(),
        }
    } else {
        AuditEvent::Login
    };
    audit::record(&state.db, Some(&user.id), &meta, event).await;

    // Token travels in the fragment so it never hits server logs.
    let destination = format!(
        "{}/auth/callback#access_token={}",
        state.config.frontend_url.trim_end_matches('/'),
        issued.access.token
    );

    Ok((
        AppendHeaders([
            (
                header::SET_COOKIE,
                cookie::refresh_cookie(&issued.refresh.token, state.config.refresh_token_ttl_secs),
            ),
            (header::SET_COOKIE, cookie::clear_oauth_state_cookie()),
        ]),
        Redirect::temporary(&destination),
    )
        .into_response())
}
