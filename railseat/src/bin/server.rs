//! Railseat server.
//!
//! Runs every service in one process over the configured transport.
//!
//! # Usage
//!
//! ```bash
//! # In-memory broker, bundled demo data
//! cargo run --bin railseat-server
//!
//! # Kafka
//! RAILSEAT_BROKER=kafka RAILSEAT_KAFKA_BROKERS=localhost:9092 \
//!     cargo run --features kafka --bin railseat-server
//! ```

use railseat::{ApplicationBuilder, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,railseat=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Railseat server...");

    let config = Config::from_env()?;
    tracing::info!(
        address = %config.server.address(),
        topology = ?config.broker.topology,
        broker = ?config.broker.kind,
        dedupe = config.consumers.dedupe_events,
        "Configuration loaded"
    );

    let app = ApplicationBuilder::new(config).build().await?;
    app.run().await?;

    tracing::info!("Railseat server stopped");
    Ok(())
}
