use bb8::Pool;
use bb8_tiberius::ConnectionManager;
use tiberius::Config;

pub type Db = Pool<ConnectionManager>;

/// Enough headroom for the auth hot path; every handler holds a
/// connection only for the duration of a single statement.
const POOL_MAX_SIZE: u32 = 10;

pub async fn connect(connection_string: &str) -> Result<Db, Box<dyn std::error::Error>> {
    let config = Config::from_ado_string(connection_string)?;
    let mgr = ConnectionManager::new(config);
    let pool = Pool::builder().max_size(POOL_MAX_SIZE).build(mgr).await?;
    Ok(pool)
}
