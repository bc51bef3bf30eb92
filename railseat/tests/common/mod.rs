//! Shared harness: every service in one process over an in-memory broker,
//! with a recording bus in front of it.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use railseat::app::ReservationDesk;
use railseat::bootstrap::assemble;
use railseat::config::Config;
use railseat::runtime::{ConsumerProgress, EventConsumer};
use railseat::server::{AppState, build_router};
use railseat::ResourceManager;
use railseat_broker::InMemoryBroker;
use railseat_core::event_bus::EventBus;
use railseat_testing::{RecordingEventBus, test_clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Default configuration with a short reattach delay and no metrics.
pub fn config() -> Config {
    let mut config = Config::default();
    config.consumers.retry_delay_ms = 10;
    config.metrics_enabled = false;
    config
}

struct Running {
    queue: String,
    progress: ConsumerProgress,
    task: JoinHandle<()>,
}

pub struct Harness {
    pub broker: InMemoryBroker,
    pub bus: Arc<RecordingEventBus>,
    pub resources: ResourceManager,
    pub state: AppState,
    consumers: Vec<EventConsumer>,
    running: Vec<Running>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Harness {
    /// Assembled with the demo seed; consumers built but not running.
    pub async fn new(config: Config) -> Self {
        Self::on_broker(config, InMemoryBroker::new()).await
    }

    /// Like [`Harness::new`], publishing to and consuming from `broker`.
    pub async fn on_broker(config: Config, broker: InMemoryBroker) -> Self {
        let bus = Arc::new(RecordingEventBus::wrapping(Arc::new(broker.clone())));
        let event_bus: Arc<dyn EventBus> = bus.clone();
        let resources = ResourceManager::new(Arc::new(test_clock()), event_bus);

        let assembly = assemble(&config, resources).await.unwrap();

        Self {
            broker,
            bus,
            resources: assembly.resources,
            state: assembly.state,
            consumers: assembly.consumers,
            running: Vec::new(),
            shutdown_tx: assembly.shutdown_tx,
        }
    }

    /// Assembled with consumers running.
    pub async fn start(config: Config) -> Self {
        let mut harness = Self::new(config).await;
        harness.spawn_consumers();
        harness
    }

    /// Like [`Harness::start`], on a shared `broker`.
    pub async fn start_on(config: Config, broker: InMemoryBroker) -> Self {
        let mut harness = Self::on_broker(config, broker).await;
        harness.spawn_consumers();
        harness
    }

    pub fn spawn_consumers(&mut self) {
        for consumer in self.consumers.drain(..) {
            self.running.push(Running {
                queue: consumer.queue().to_string(),
                progress: consumer.progress(),
                task: consumer.spawn(),
            });
        }
    }

    pub fn desk(&self) -> &Arc<dyn ReservationDesk> {
        &self.state.reservations
    }

    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Wait until every running consumer has handled everything enqueued on
    /// its queue.
    pub async fn drain(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self
                .running
                .iter()
                .all(|r| r.progress.handled() >= self.broker.enqueued(&r.queue))
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("consumers did not drain");
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        for running in self.running {
            running.task.await.unwrap();
        }
    }
}
