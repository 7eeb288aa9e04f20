use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("Too many attempts")]
    TooManyAttempts,

    #[error("Provider not supported: {0}")]
    ProviderNotSupported(String),

    #[error("Provider not configured")]
    ProviderNotConfigured,

    #[error("Payments not configured")]
    PaymentsNotConfigured,

    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            // Authentication failures stay generic: the body never says
            // whether the account exists or which check failed.
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AppError::EmailTaken => (StatusCode::CONFLICT, "email_taken", self.to_string()),
            AppError::WeakPassword(_) => {
                (StatusCode::BAD_REQUEST, "weak_password", self.to_string())
            }
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "user_not_found", self.to_string()),
            AppError::SessionNotFound => (
                StatusCode::UNAUTHORIZED,
                "session_not_found",
                self.to_string(),
            ),
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "invalid_token", self.to_string())
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            // Soft outcome: clients render an upgrade prompt, not an error page.
            AppError::InsufficientCredits => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
            ),
            AppError::TooManyAttempts => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_attempts",
                "Too many attempts. Please try again later.".to_string(),
            ),
            AppError::ProviderNotSupported(_) => (
                StatusCode::BAD_REQUEST,
                "provider_not_supported",
                self.to_string(),
            ),
            AppError::ProviderNotConfigured => (
                StatusCode::BAD_REQUEST,
                "provider_not_configured",
                self.to_string(),
            ),
            AppError::PaymentsNotConfigured => (
                StatusCode::BAD_REQUEST,
                "payments_not_configured",
                self.to_string(),
            ),
            AppError::UnknownProduct(_) => {
                (StatusCode::BAD_REQUEST, "unknown_product", self.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
            AppError::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid token".to_string(),
            ),
            AppError::HttpClient(e) => {
                tracing::error!("HTTP client error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    "External provider error".to_string(),
                )
            }
        };

        let body = json!({
            "error": error_type,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
