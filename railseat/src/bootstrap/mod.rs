//! Application assembly.
//!
//! # Modules
//!
//! - **`resources`**: clock, event bus and the three owned services
//! - **`consumers`**: one durable-queue consumer per local service
//! - **`builder`**: topology selection, router and [`Application`](crate::runtime::Application)
//!
//! # Example
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! ApplicationBuilder::new(config)
//!     .build()
//!     .await?
//!     .run()
//!     .await?;
//! ```

pub mod builder;
pub mod consumers;
pub mod resources;

pub use builder::{ApplicationBuilder, Assembly, assemble};
pub use consumers::{local_queues, register_consumers};
pub use resources::ResourceManager;

use crate::config::ConfigError;
use crate::runtime::MissingPart;
use crate::seed::SeedError;
use railseat_core::event_bus::EventBusError;
use railseat_runtime::metrics::MetricsError;
use thiserror::Error;

/// Failures while starting the process.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Environment could not be read
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Broker connection or queue declaration failed
    #[error("event bus setup failed: {0}")]
    EventBus(#[from] EventBusError),

    /// Kafka was requested in a build without the `kafka` feature
    #[error("RAILSEAT_BROKER=kafka requires building with the `kafka` feature")]
    KafkaDisabled,

    /// Seed data could not be loaded
    #[error(transparent)]
    Seed(#[from] SeedError),

    /// A consumer was wired incompletely
    #[error(transparent)]
    Consumer(#[from] MissingPart),

    /// Prometheus recorder could not be installed
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// The listener could not be bound
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested
        address: String,
        /// I/O failure
        source: std::io::Error,
    },
}
