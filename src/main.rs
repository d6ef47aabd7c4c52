use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use geodoc::config::{Cli, Config};
use geodoc::geocode::GistdaGeocoder;
use geodoc::state::AppState;
use geodoc::storage::{Storage, UploadKind};
use geodoc::{auth, db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure upload directories exist
    let storage = Storage::new(config.public_dir());
    for kind in [UploadKind::Document, UploadKind::Cover, UploadKind::Avatar] {
        std::fs::create_dir_all(storage.uploads_dir().join(kind.bucket()))?;
    }
    tracing::info!("Serving uploads from {}", storage.uploads_dir().display());

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password)
    {
        auth::bootstrap_admin(&pool, email, password)?;
    }

    if config.geocoder.api_key.is_none() {
        tracing::warn!("No geocoder API key configured; reverse geocoding may be refused");
    }

    // Build app state
    let state = AppState {
        db: pool,
        geocoder: Arc::new(GistdaGeocoder::new(&config.geocoder)),
        storage,
        config: config.clone(),
    };

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
