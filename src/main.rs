use std::net::SocketAddr;
use std::path::Path;

use sqlx::migrate::Migrator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chamapay::config::Config;
use chamapay::mpesa::MpesaClient;
use chamapay::{AppState, create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    // Gateway client, built once from env and read-only thereafter
    let mpesa = config.mpesa.clone().map(MpesaClient::new);
    match &mpesa {
        Some(_) => tracing::info!("M-Pesa gateway client initialized"),
        None => tracing::warn!(
            "M-Pesa credentials not configured; payment routes will answer with errors"
        ),
    }

    let app = create_app(AppState { db: pool, mpesa });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
