pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod payments;
pub mod rate_limit;
pub mod routes;

use auth::tokens::TokenCodec;
use config::Config;
use db::pool::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub tokens: TokenCodec,
    pub config: Config,
}

impl AsRef<AppState> for AppState {
    fn as_ref(&self) -> &AppState {
        self
    }
}
