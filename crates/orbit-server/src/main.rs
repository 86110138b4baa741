//! # Orbit server
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (0.0.0.0:3000)
//! orbit
//!
//! # Use a specific config file
//! ORBIT_CONFIG=/path/to/orbit.toml orbit
//!
//! # Override settings from the environment
//! PORT=8080 ORBIT_RELAY__PATH=/ws orbit
//! ```

use anyhow::Result;
use orbit_server::{config::Config, metrics, run_server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orbit=debug,orbit_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var_os("ORBIT_CONFIG") {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    tracing::info!("Starting Orbit server on {}:{}", config.host, config.port);

    metrics::init_metrics();
    run_server(config).await?;

    Ok(())
}
