#![allow(dead_code)]

use account_service::auth::tokens::TokenCodec;
use account_service::config::{Config, PaymentConfig};
use account_service::payments;
use account_service::routes::create_router;
use account_service::AppState;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

// ─── TestResponse ────────────────────────────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body_bytes).unwrap_or_else(|e| {
            panic!(
                "Failed to deserialize response as {}: {e}\nBody: {}",
                std::any::type_name::<T>(),
                self.text()
            )
        })
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status, expected,
            "Expected status {expected}, got {}. Body: {}",
            self.status,
            self.text()
        );
    }

    /// Value of a Set-Cookie header for `name`, if any.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.headers
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&prefix))
            .map(|v| {
                v[prefix.len()..]
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
    }
}

// ─── TestApp ─────────────────────────────────────────────────────────────────

pub struct TestApp {
    router: Router,
    pub state: AppState,
    /// Unique source address per app so lockout counters never bleed
    /// between tests.
    pub ip: String,
}

impl TestApp {
    /// `None` when TEST_DATABASE_URL is unset; callers skip the test.
    pub async fn new() -> Option<Self> {
        let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

        let config = Config {
            database_url: database_url.clone(),
            token_secret: "test-token-secret-0123456789".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604800,
            daily_credit_allotment: 5,
            failed_login_limit: 5,
            failed_login_window_mins: 15,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origins: "http://localhost:5173".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            oauth_redirect_base: "http://localhost:3000".to_string(),
            github: None,
            google: None,
            payments: Some(PaymentConfig {
                api_url: "http://payments.test".to_string(),
                api_key: "test-api-key".to_string(),
                webhook_secret: WEBHOOK_SECRET.to_string(),
            }),
        };

        let db = account_service::db::pool::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        account_service::db::migration::run(&db)
            .await
            .expect("Failed to apply schema");

        let tokens = TokenCodec::new(&config);

        let state = AppState { db, tokens, config };
        let router = create_router(state.clone());

        let bytes = Uuid::new_v4().into_bytes();
        let ip = format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2]);

        Some(Self { router, state, ip })
    }

    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot failed");

        let status = resp.status();
        let headers = resp.headers().clone();
        let body_bytes = resp
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    // ── Auth helpers ─────────────────────────────────────────────────────

    pub fn unique_email(&self, prefix: &str) -> String {
        format!("{prefix}-{}@test.com", Uuid::new_v4())
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .header("x-forwarded-for", &self.ip)
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.request(req).await
    }

    pub async fn register_user(&self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/auth/register",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn login_user(&self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn bearer_get(&self, uri: &str, token: &str) -> TestResponse {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .header("Authorization", format!("Bearer {token}"))
            .header("x-forwarded-for", &self.ip)
            .body(Body::empty())
            .unwrap();
        self.request(req).await
    }

    pub async fn bearer_post(
        &self,
        uri: &str,
        token: &str,
        body: serde_json::Value,
    ) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {token}"))
            .header("x-forwarded-for", &self.ip)
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.request(req).await
    }

    pub async fn post_with_refresh_cookie(&self, uri: &str, refresh_token: &str) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Cookie", format!("refresh_token={refresh_token}"))
            .header("x-forwarded-for", &self.ip)
            .body(Body::empty())
            .unwrap();
        self.request(req).await
    }

    /// Register and return (user_id, access_token, refresh_token).
    pub async fn register_and_tokens(&self, prefix: &str) -> (String, String, String) {
        let email = self.unique_email(prefix);
        let resp = self.register_user(&email, "Password1!").await;
        resp.assert_status(StatusCode::CREATED);
        let json: serde_json::Value = resp.json();
        let access = json["access_token"].as_str().unwrap().to_string();
        let refresh = resp.cookie("refresh_token").expect("refresh cookie set");

        let me = self.bearer_get("/auth/me", &access).await;
        me.assert_status(StatusCode::OK);
        let me_json: serde_json::Value = me.json();
        let user_id = me_json["user"]["id"].as_str().unwrap().to_string();

        (user_id, access, refresh)
    }

    // ── Webhook helpers ──────────────────────────────────────────────────

    pub async fn send_payment_webhook(
        &self,
        payment_id: &str,
        user_id: &str,
        product_id: &str,
    ) -> TestResponse {
        let body = serde_json::json!({
            "payment_id": payment_id,
            "user_id": user_id,
            "product_id": product_id,
            "status": "completed",
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let signature = payments::sign_webhook_body(WEBHOOK_SECRET, &raw);

        let req = Request::builder()
            .method("POST")
            .uri("/credits/webhook")
            .header("Content-Type", "application/json")
            .header("x-webhook-signature", signature)
            .body(Body::from(raw))
            .unwrap();
        self.request(req).await
    }

    // ── Direct store helpers ─────────────────────────────────────────────

    pub async fn latest_auth_token(&self, user_id: &str, kind: &str) -> Option<String> {
        let mut conn = self.state.db.get().await.expect("pool get");
        let row = conn
            .query(
                "SELECT TOP 1 token FROM auth_tokens WHERE user_id = @P1 AND kind = @P2 ORDER BY created_at DESC",
                &[&user_id, &kind],
            )
            .await
            .expect("query auth_tokens")
            .into_row()
            .await
            .expect("row auth_tokens");
        row.and_then(|r| r.get::<&str, _>("token").map(|s| s.to_string()))
    }

    pub async fn daily_reset_date(&self, user_id: &str) -> Option<chrono::NaiveDateTime> {
        let mut conn = self.state.db.get().await.expect("pool get");
        let row = conn
            .query(
                "SELECT reset_date FROM credits WHERE user_id = @P1 AND credit_type = 'daily'",
                &[&user_id],
            )
            .await
            .expect("query credits")
            .into_row()
            .await
            .expect("row credits");
        row.and_then(|r| r.get::<chrono::NaiveDateTime, _>("reset_date"))
    }

    pub async fn credit_row_count(&self, user_id: &str) -> i64 {
        let mut conn = self.state.db.get().await.expect("pool get");
        let row = conn
            .query(
                "SELECT COUNT(*) AS cnt FROM credits WHERE user_id = @P1",
                &[&user_id],
            )
            .await
            .expect("query credits count")
            .into_row()
            .await
            .expect("row credits count");
        row.map(|r| r.get::<i32, _>("cnt").unwrap_or(0) as i64)
            .unwrap_or(0)
    }
}

/// Skip boilerplate: evaluates to the app or returns early.
#[macro_export]
macro_rules! require_test_db {
    () => {
        match common::TestApp::new().await {
            Some(app) => app,
            None => {
                eprintln!("skipping: TEST_DATABASE_URL not set");
                return;
            }
        }
    };
}
