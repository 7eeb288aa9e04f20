use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;

use crate::auth::middleware::client_ip;

/// Per-key sliding window rate limiter. Transport-level brute-force
/// protection for the auth routes; account-level lockout is the audit
/// log's job.
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<RateLimiterInner>>,
    max_requests: u32,
    window: Duration,
}

struct RateLimiterInner {
    buckets: HashMap<String, Vec<Instant>>,
    last_cleanup: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimiterInner {
                buckets: HashMap::new(),
                last_cleanup: Instant::now(),
            })),
            max_requests,
            window,
        }
    }

    async fn check(&self, key: &str) -> bool {
        let mut inner = self.state.lock().await;
        let now = Instant::now();

        // Periodic cleanup of expired entries (every 60s)
        if now.duration_since(inner.last_cleanup) > Duration::from_secs(60) {
            inner.buckets.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
            inner.last_cleanup = now;
        }

        let timestamps = inner.buckets.entry(key.to_string()).or_default();

        // Remove expired timestamps
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests as usize {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Axum middleware that rate-limits by client IP, falling back to a
/// global bucket when no address header is present.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_ip(req.headers()).unwrap_or_else(|| "global".to_string());

    if !limiter.check(&key).await {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(serde_json::json!({
                "error": "rate_limited",
                "message": "Too many requests. Please try again later."
            })),
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::RateLimiter;
    use std::time::Duration;

    #[tokio::test]
    async fn enforces_the_window_cap_per_key() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("1.2.3.4").await);
        }
        assert!(!limiter.check("1.2.3.4").await);
        // A different key has its own bucket.
        assert!(limiter.check("5.6.7.8").await);
    }

    #[tokio::test]
    async fn window_expiry_frees_the_bucket() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("1.2.3.4").await);
        assert!(!limiter.check("1.2.3.4").await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.check("1.2.3.4").await);
    }
}
