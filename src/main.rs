use std::net::SocketAddr;
use std::time::Duration;

use account_service::config::Config;
use account_service::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "account_service=debug,tower_http=debug".into()),
        )
        .init();

    // Load config; a missing signing secret or store URL refuses to start.
    let config = Config::from_env()?;

    // Connect to database
    let db = account_service::db::pool::connect(&config.database_url).await?;
    tracing::info!("Connected to database");

    // Apply schema
    account_service::db::migration::run(&db).await?;
    tracing::info!("Schema applied");

    // Initialize token codec
    let tokens = account_service::auth::tokens::TokenCodec::new(&config);

    // Build app state
    let state = AppState {
        db,
        tokens,
        config: config.clone(),
    };

    // Hourly sweep of expired sessions; lookups already treat them as
    // gone, this just reclaims the rows.
    {
        let db = state.db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                let now = chrono::Utc::now().naive_utc();
                match account_service::db::queries::sessions::delete_expired(&db, now).await {
                    Ok(swept) if swept > 0 => {
                        tracing::info!("Swept {swept} expired sessions");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Session sweep failed: {e}"),
                }
            }
        });
    }

    // Build router
    let app = account_service::routes::create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .expect("Invalid server address");

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
