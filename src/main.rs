use std::net::SocketAddr;

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sf311::{api, config::Settings, state::AppState, warehouse};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded (backend: {:?})", settings.backend);

    let warehouse = warehouse::connect(&settings).await?;
    info!("Warehouse ready");

    let addr = SocketAddr::new(
        settings.host.parse().unwrap_or([0, 0, 0, 0].into()),
        settings.port,
    );

    let state = AppState::new(warehouse, settings);
    let app = api::router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
