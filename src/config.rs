use std::env;

/// Startup configuration errors. Any of these refuses to start the
/// process; there is no degraded mode without a signing secret or store.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid TTL in {var}: {value:?} (expected <number><s|m|h|d>)")]
    InvalidTtl { var: &'static str, value: String },

    #[error("Invalid value in {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Credentials for one external identity provider.
#[derive(Clone, Debug)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Payment gateway settings. Absent settings disable the purchase
/// endpoints rather than the whole service.
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub api_url: String,
    pub api_key: String,
    pub webhook_secret: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub token_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub daily_credit_allotment: i64,
    pub failed_login_limit: i64,
    pub failed_login_window_mins: i64,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origins: String,
    pub frontend_url: String,
    pub oauth_redirect_base: String,
    pub github: Option<ProviderCredentials>,
    pub google: Option<ProviderCredentials>,
    pub payments: Option<PaymentConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;
        let token_secret =
            env::var("TOKEN_SECRET").map_err(|_| ConfigError::MissingVar("TOKEN_SECRET"))?;
        if token_secret.is_empty() {
            return Err(ConfigError::MissingVar("TOKEN_SECRET"));
        }

        let access_token_ttl_secs = parse_ttl_var("ACCESS_TOKEN_TTL", "15m")?;
        let refresh_token_ttl_secs = parse_ttl_var("REFRESH_TOKEN_TTL", "7d")?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            database_url,
            token_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            daily_credit_allotment: parse_i64_var("DAILY_CREDIT_ALLOTMENT", 5)?,
            failed_login_limit: parse_i64_var("FAILED_LOGIN_LIMIT", 5)?,
            failed_login_window_mins: parse_i64_var("FAILED_LOGIN_WINDOW_MINS", 15)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string()),
            oauth_redirect_base: env::var("OAUTH_REDIRECT_BASE")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            frontend_url,
            github: provider_from_env("OAUTH_GITHUB_CLIENT_ID", "OAUTH_GITHUB_CLIENT_SECRET"),
            google: provider_from_env("OAUTH_GOOGLE_CLIENT_ID", "OAUTH_GOOGLE_CLIENT_SECRET"),
            payments: payments_from_env(),
        })
    }
}

fn provider_from_env(id_var: &str, secret_var: &str) -> Option<ProviderCredentials> {
    match (env::var(id_var), env::var(secret_var)) {
        (Ok(client_id), Ok(client_secret)) => Some(ProviderCredentials {
            client_id,
            client_secret,
        }),
        _ => None,
    }
}

fn payments_from_env() -> Option<PaymentConfig> {
    match (
        env::var("PAYMENTS_API_URL"),
        env::var("PAYMENTS_API_KEY"),
        env::var("PAYMENTS_WEBHOOK_SECRET"),
    ) {
        (Ok(api_url), Ok(api_key), Ok(webhook_secret)) => Some(PaymentConfig {
            api_url,
            api_key,
            webhook_secret,
        }),
        _ => None,
    }
}

fn parse_ttl_var(var: &'static str, default: &str) -> Result<i64, ConfigError> {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    parse_ttl(&raw).ok_or(ConfigError::InvalidTtl { var, value: raw })
}

fn parse_i64_var(var: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}

/// Parse a TTL string with a unit suffix (`s`, `m`, `h`, `d`) into seconds.
/// Anything else is `None`; an unrecognized unit never silently defaults.
pub fn parse_ttl(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.len() < 2 {
        return None;
    }
    let (number, unit) = raw.split_at(raw.len() - 1);
    let value: i64 = number.parse().ok()?;
    if value < 0 {
        return None;
    }
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::parse_ttl;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_ttl("30s"), Some(30));
        assert_eq!(parse_ttl("15m"), Some(900));
        assert_eq!(parse_ttl("2h"), Some(7200));
        assert_eq!(parse_ttl("7d"), Some(604800));
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(parse_ttl(" 15m "), Some(900));
    }

    #[test]
    fn rejects_missing_or_unknown_suffix() {
        assert_eq!(parse_ttl("15w"), None);
        assert_eq!(parse_ttl("15"), None);
        assert_eq!(parse_ttl("15 m"), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_ttl(""), None);
        assert_eq!(parse_ttl("m"), None);
        assert_eq!(parse_ttl("-5m"), None);
        assert_eq!(parse_ttl("abcm"), None);
    }
}
