//! Cookie parsing and formatting for the refresh-token and OAuth-state
//! cookies.

use axum::http::header;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
pub const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Refresh cookie, scoped to the auth routes. The browser is the only
/// holder; scripts never see it.
pub fn refresh_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{REFRESH_COOKIE_NAME}={token}; Path=/auth; HttpOnly; Secure; SameSite=Lax; Max-Age={max_age_secs}"
    )
}

pub fn clear_refresh_cookie() -> String {
    format!("{REFRESH_COOKIE_NAME}=; Path=/auth; HttpOnly; Secure; SameSite=Lax; Max-Age=0")
}

/// Short-lived CSRF state for the OAuth round trip.
pub fn oauth_state_cookie(state: &str) -> String {
    format!(
        "{OAUTH_STATE_COOKIE_NAME}={state}; Path=/auth/oauth; HttpOnly; Secure; SameSite=Lax; Max-Age=600"
    )
}

pub fn clear_oauth_state_cookie() -> String {
    format!("{OAUTH_STATE_COOKIE_NAME}=; Path=/auth/oauth; HttpOnly; Secure; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn get_cookie_finds_value_among_many() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; refresh_token=abc123; oauth_state=xyz"),
        );

        assert_eq!(get_cookie(&headers, "refresh_token"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "oauth_state"), Some("xyz"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
    }

    #[test]
    fn get_cookie_handles_missing_header_and_name() {
        let empty = axum::http::HeaderMap::new();
        assert_eq!(get_cookie(&empty, "refresh_token"), None);

        let mut headers = axum::http::HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));
        assert_eq!(get_cookie(&headers, "refresh_token"), None);
    }

    #[test]
    fn get_cookie_trims_spaces() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  refresh_token = abc123  ; foo=bar"),
        );
        assert_eq!(get_cookie(&headers, "refresh_token"), Some("abc123"));
    }

    #[test]
    fn refresh_cookie_is_scoped_and_http_only() {
        let cookie = refresh_cookie("tok", 604800);
        assert!(cookie.starts_with("refresh_token=tok"));
        for attr in ["Path=/auth", "HttpOnly", "Secure", "SameSite=Lax", "Max-Age=604800"] {
            assert!(cookie.contains(attr), "missing {attr} in {cookie}");
        }
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_refresh_cookie().contains("Max-Age=0"));
        assert!(clear_oauth_state_cookie().contains("Max-Age=0"));
    }
}
