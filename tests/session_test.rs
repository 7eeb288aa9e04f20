mod common;

use axum::http::StatusCode;
use serial_test::serial;

#[serial]
#[tokio::test]
async fn refresh_mints_a_new_access_token() {
    let app = require_test_db!();
    let (_user_id, old_access, refresh) = app.register_and_tokens("refresh").await;

    let resp = app.post_with_refresh_cookie("/auth/refresh", &refresh).await;
    resp.assert_status(StatusCode::OK);
    let json: serde_json::Value = resp.json();
    let new_access = json["access_token"].as_str().unwrap().to_string();
    assert!(!new_access.is_empty());

    // The new token is live; the session anchors the same login.
    app.bearer_get("/auth/me", &new_access)
        .await
        .assert_status(StatusCode::OK);

    // The refresh token was not rotated: the same cookie keeps working.
    app.post_with_refresh_cookie("/auth/refresh", &refresh)
        .await
        .assert_status(StatusCode::OK);

    // Old access tokens stay valid until their own expiry; refresh does
    // not revoke them.
    app.bearer_get("/auth/me", &old_access)
        .await
        .assert_status(StatusCode::OK);
}

#[serial]
#[tokio::test]
async fn access_token_cannot_be_replayed_as_refresh_token() {
    let app = require_test_db!();
    let (_user_id, access, _refresh) = app.register_and_tokens("confuse").await;

    app.post_with_refresh_cookie("/auth/refresh", &access)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[serial]
#[tokio::test]
async fn refresh_without_cookie_clears_and_fails() {
    let app = require_test_db!();

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .header("x-forwarded-for", &app.ip)
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.request(req).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.cookie("refresh_token").as_deref(), Some(""));
}

#[serial]
#[tokio::test]
async fn refresh_after_logout_is_session_not_found() {
    let app = require_test_db!();
    let (_user_id, access, refresh) = app.register_and_tokens("logout").await;

    let resp = app
        .bearer_post("/auth/logout", &access, serde_json::json!({}))
        .await;
    resp.assert_status(StatusCode::OK);
    // Logout clears the refresh cookie.
    assert_eq!(resp.cookie("refresh_token").as_deref(), Some(""));

    // The refresh token still verifies cryptographically, but its session
    // is gone. Fatal for this request.
    app.post_with_refresh_cookie("/auth/refresh", &refresh)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[serial]
#[tokio::test]
async fn session_lookup_hides_expired_and_invalidated_rows() {
    use account_service::auth::session::hash_token;
    use account_service::db::queries::sessions;
    use chrono::{Duration, Utc};

    let app = require_test_db!();
    let (_user_id, access, _refresh) = app.register_and_tokens("lookup").await;

    let now = Utc::now().naive_utc();
    let digest = hash_token(&access);

    let found = sessions::find_by_token(&app.state.db, &digest, now)
        .await
        .unwrap();
    let session = found.expect("live session visible by access-token digest");

    // Past its expiry the same row behaves as not-found.
    let after_expiry = now + Duration::days(8);
    assert!(sessions::find_by_token(&app.state.db, &digest, after_expiry)
        .await
        .unwrap()
        .is_none());

    // Invalidation is indistinguishable from expiry to callers.
    sessions::invalidate(&app.state.db, &session.id)
        .await
        .unwrap();
    assert!(sessions::find_by_token(&app.state.db, &digest, now)
        .await
        .unwrap()
        .is_none());
}

#[serial]
#[tokio::test]
async fn sessions_are_device_scoped() {
    let app = require_test_db!();
    let email = app.unique_email("twodevices");
    app.register_user(&email, "Password1!")
        .await
        .assert_status(StatusCode::CREATED);

    let login_a = app.login_user(&email, "Password1!").await;
    let login_b = app.login_user(&email, "Password1!").await;
    let refresh_a = login_a.cookie("refresh_token").unwrap();
    let refresh_b = login_b.cookie("refresh_token").unwrap();
    let access_a = login_a.json::<serde_json::Value>()["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    // Logging out device A leaves device B's session untouched.
    app.bearer_post("/auth/logout", &access_a, serde_json::json!({}))
        .await
        .assert_status(StatusCode::OK);

    app.post_with_refresh_cookie("/auth/refresh", &refresh_a)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.post_with_refresh_cookie("/auth/refresh", &refresh_b)
        .await
        .assert_status(StatusCode::OK);
}
