use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::audit::{self, AuditEvent};
use crate::auth::middleware::{AuthenticatedUser, ClientMeta};
use crate::db::models::CreditUsageRecord;
use crate::db::queries;
use crate::db::queries::credits::UsageAction;
use crate::error::AppError;
use crate::payments;
use crate::AppState;

const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";
const USAGE_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    pub action: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment_id: String,
    pub user_id: String,
    pub product_id: String,
    pub status: String,
}

/// Start a purchase: resolve the product from the closed catalog and ask
/// the gateway for a checkout the browser can be sent to.
pub async fn purchase(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let product = payments::find_product(&req.product_id)
        .ok_or_else(|| AppError::UnknownProduct(req.product_id.clone()))?;

    let gateway = payments::create_gateway(&state.config)?;
    let checkout = gateway.create_checkout(&user.user_id, product).await?;

    Ok(Json(json!({ "checkout_url": checkout.checkout_url })))
}

/// Payment-provider callback. Replays of the same payment id are a no-op:
/// the grant only happens when the payment row was inserted fresh.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let payments_config = state
        .config
        .payments
        .as_ref()
        .ok_or(AppError::PaymentsNotConfigured)?;

    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    if !payments::verify_webhook_signature(&payments_config.webhook_secret, &body, signature) {
        return Err(AppError::Unauthorized);
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    if payload.status != "completed" {
        return Ok(Json(json!({"status": "ignored"})));
    }

    // The grant amount comes from the catalog, never from the payload.
    let product = payments::find_product(&payload.product_id)
        .ok_or_else(|| AppError::UnknownProduct(payload.product_id.clone()))?;

    let user = queries::users::find_by_id(&state.db, &payload.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let now = Utc::now().naive_utc();
    let is_new = queries::payments::record_if_new(
        &state.db,
        &payload.payment_id,
        &user.id,
        product.id,
        product.credits,
        now,
    )
    .await?;
    if !is_new {
        return Ok(Json(json!({"status": "duplicate"})));
    }

    queries::credits::add_purchased(&state.db, &user.id, product.credits).await?;

    let meta = ClientMeta::from_headers(&headers);
    audit::record(
        &state.db,
        Some(&user.id),
        &meta,
        AuditEvent::CreditPurchase {
            payment_id: payload.payment_id,
            credits: product.credits,
        },
    )
    .await;

    Ok(Json(json!({"status": "ok"})))
}

/// Spend credits on a metered action. Reset check and deduction run as
/// one logical unit for this request.
pub async fn consume(
    user: AuthenticatedUser,
    meta: ClientMeta,
    State(state): State<AppState>,
    Json(req): Json<ConsumeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let amount = req.amount.unwrap_or(1);
    if amount < 1 {
        return Err(AppError::BadRequest(
            "amount must be a positive integer".to_string(),
        ));
    }

    let action = match req.action.as_str() {
        "chat_message" => UsageAction::ChatMessage {
            conversation_id: req.conversation_id,
        },
        "code_generation" => UsageAction::CodeGeneration {
            project_id: req.project_id,
        },
        other => {
            return Err(AppError::BadRequest(format!("Unknown action: {other}")));
        }
    };

    let now = Utc::now().naive_utc();
    queries::credits::check_and_reset(
        &state.db,
        &user.user_id,
        state.config.daily_credit_allotment,
        now,
    )
    .await?;

    let deducted =
        queries::credits::deduct(&state.db, &user.user_id, amount, &action, now).await?;
    if !deducted {
        audit::record(
            &state.db,
            Some(&user.user_id),
            &meta,
            AuditEvent::CreditsExhausted {
                action: action.action_type(),
            },
        )
        .await;
        return Err(AppError::InsufficientCredits);
    }

    let balance = queries::credits::balance(&state.db, &user.user_id).await?;
    Ok(Json(json!({
        "deducted": amount,
        "credits": {
            "daily": balance.daily,
            "purchased": balance.purchased,
            "total": balance.total(),
        },
    })))
}

pub async fn usage(
    user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CreditUsageRecord>>, AppError> {
    let records =
        queries::credits::list_usage(&state.db, &user.user_id, USAGE_PAGE_SIZE).await?;
    Ok(Json(records))
}
