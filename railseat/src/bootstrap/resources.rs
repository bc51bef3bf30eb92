//! Infrastructure and owned services.

use super::BootstrapError;
use crate::app::{SeatService, Sha256Hasher, TrainService, UserDirectory};
use crate::config::{BrokerKind, Config};
use crate::events::queues;
use crate::seed::{SeedData, SeedSummary};
use railseat_broker::InMemoryBroker;
use railseat_core::environment::{Clock, SystemClock};
use railseat_core::event_bus::{EventBus, EventBusError};
use std::sync::Arc;
use tracing::info;

/// Everything the orchestrator and the consumers share.
///
/// The three services each own their state behind their own `Store`; the
/// manager only hands out clones.
#[derive(Clone)]
pub struct ResourceManager {
    /// Time source for rows and events
    pub clock: Arc<dyn Clock>,
    /// Transport for `reservation.*` events
    pub event_bus: Arc<dyn EventBus>,
    /// Seat store
    pub seats: SeatService,
    /// Train inventory
    pub trains: TrainService,
    /// User directory
    pub users: UserDirectory,
}

impl ResourceManager {
    /// Fresh, empty services over `event_bus`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            seats: SeatService::new(Arc::clone(&clock)),
            trains: TrainService::new(),
            users: UserDirectory::new(Arc::new(Sha256Hasher)),
            clock,
            event_bus,
        }
    }

    /// Services over the transport named by `config`.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::KafkaDisabled`] when Kafka is requested without the
    /// `kafka` feature, or the Kafka client's setup error.
    pub fn from_config(config: &Config) -> Result<Self, BootstrapError> {
        let event_bus: Arc<dyn EventBus> = match config.broker.kind {
            BrokerKind::Memory => {
                info!("Using in-memory broker");
                Arc::new(InMemoryBroker::new())
            },
            BrokerKind::Kafka => kafka_bus(&config.broker.kafka_brokers)?,
        };

        Ok(Self::new(Arc::new(SystemClock), event_bus))
    }

    /// Declare the durable queue of each service in `services`, bound to
    /// both reservation topics.
    ///
    /// Must run before the first publish so no event is published to a
    /// topic with no queue bound to it.
    ///
    /// # Errors
    ///
    /// Returns the transport's [`EventBusError`].
    pub async fn declare_queues(&self, services: &[&str]) -> Result<(), EventBusError> {
        for queue in services {
            self.event_bus.declare(queue, &queues::TOPICS).await?;
            info!(queue, topics = ?queues::TOPICS, "Durable queue declared");
        }
        Ok(())
    }

    /// Load the configured seed file, or the bundled demo data.
    ///
    /// # Errors
    ///
    /// Returns the [`SeedError`](crate::seed::SeedError) as a
    /// [`BootstrapError`].
    pub async fn seed(&self, config: &Config) -> Result<SeedSummary, BootstrapError> {
        let data = match &config.seed_path {
            Some(path) => {
                info!(path = %path.display(), "Loading seed file");
                SeedData::load(path)?
            },
            None => SeedData::demo()?,
        };
        Ok(data.apply(&self.trains, &self.seats, &self.users).await?)
    }
}

#[cfg(feature = "kafka")]
fn kafka_bus(brokers: &str) -> Result<Arc<dyn EventBus>, BootstrapError> {
    info!(brokers, "Using Kafka broker");
    Ok(Arc::new(railseat_broker::KafkaEventBus::new(brokers)?))
}

#[cfg(not(feature = "kafka"))]
fn kafka_bus(_brokers: &str) -> Result<Arc<dyn EventBus>, BootstrapError> {
    Err(BootstrapError::KafkaDisabled)
}
