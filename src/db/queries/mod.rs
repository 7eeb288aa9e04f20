pub mod audit;
pub mod auth_tokens;
pub mod credits;
pub mod oauth_accounts;
pub mod payments;
pub mod sessions;
pub mod users;
