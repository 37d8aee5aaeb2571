use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gallery::{AppState, Backends, GalleryConfig, create_router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gallery=info,tower_http=info")),
        )
        .init();

    info!("Starting gallery service");

    let config = GalleryConfig::load()?;
    let backends = Backends::connect(&config).await?;
    let address = format!("{}:{}", config.server.host, config.server.port);

    let app_state = AppState::new(config, backends);
    info!("Gallery service initialized successfully");

    // Start the web server
    let app = create_router(app_state);

    let listener = TcpListener::bind(&address).await?;
    info!("Gallery service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
