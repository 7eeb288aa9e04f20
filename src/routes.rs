use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Credential endpoints: 20 requests per IP per 60 seconds.
    let auth_limiter = RateLimiter::new(20, Duration::from_secs(60));

    // Credential and token-lifecycle endpoints, rate limited.
    let credential_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout))
        .route(
            "/password-reset/request",
            post(handlers::auth::password_reset_request),
        )
        .route(
            "/password-reset/confirm",
            post(handlers::auth::password_reset_confirm),
        )
        .route("/verify-email", post(handlers::auth::verify_email))
        .route("/oauth/:provider", get(handlers::oauth::start))
        .route("/oauth/callback/:provider", get(handlers::oauth::callback))
        .route_layer(middleware::from_fn_with_state(
            auth_limiter,
            rate_limit_middleware,
        ));

    // Profile endpoints (require Bearer token)
    let profile_routes = Router::new().route(
        "/me",
        get(handlers::user::me)
            .patch(handlers::user::update_me)
            .delete(handlers::user::delete_me),
    );

    let credit_routes = Router::new()
        .route("/purchase", post(handlers::credits::purchase))
        .route("/webhook", post(handlers::credits::webhook))
        .route("/consume", post(handlers::credits::consume))
        .route("/usage", get(handlers::credits::usage));

    Router::new()
        .nest("/auth", credential_routes.merge(profile_routes))
        .nest("/credits", credit_routes)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
