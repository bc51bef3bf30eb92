//! Consumer registration.
//!
//! One consumer per local service, draining that service's durable queue.
//! A service reached over HTTP has its consumer in the process that owns its
//! state, so none is registered here.

use super::ResourceManager;
use crate::config::{CollaboratorConfig, ConsumerConfig};
use crate::events::queues;
use crate::runtime::consumer::EventConsumer;
use crate::runtime::handlers::{EventHandler, ProcessedLog, SeatEventHandler, TrainEventHandler};
use crate::runtime::MissingPart;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Queues drained by this process: one per service that is not remote.
#[must_use]
pub fn local_queues(collaborators: &CollaboratorConfig) -> Vec<&'static str> {
    let mut local = Vec::with_capacity(2);
    if collaborators.seats_local() {
        local.push(queues::SEAT_SERVICE);
    }
    if collaborators.trains_local() {
        local.push(queues::TRAIN_SERVICE);
    }
    local
}

/// Build the consumers of the local seat store and train inventory.
///
/// # Errors
///
/// [`MissingPart`] if a consumer is wired incompletely.
pub fn register_consumers(
    resources: &ResourceManager,
    config: &ConsumerConfig,
    collaborators: &CollaboratorConfig,
    shutdown: &broadcast::Sender<()>,
) -> Result<Vec<EventConsumer>, MissingPart> {
    local_queues(collaborators)
        .into_iter()
        .map(|queue| {
            let handler: Arc<dyn EventHandler> = if queue == queues::SEAT_SERVICE {
                Arc::new(SeatEventHandler::new(
                    resources.seats.clone(),
                    config.seat,
                    ProcessedLog::new(config.dedupe_events),
                ))
            } else {
                Arc::new(TrainEventHandler::new(
                    resources.trains.clone(),
                    config.train,
                    ProcessedLog::new(config.dedupe_events),
                ))
            };
            info!(queue, "Registering consumer");

            queues::TOPICS
                .iter()
                .fold(EventConsumer::builder().queue(queue), |builder, topic| {
                    builder.topic(*topic)
                })
                .event_bus(Arc::clone(&resources.event_bus))
                .handler(handler)
                .shutdown(shutdown.subscribe())
                .retry_delay(config.retry_delay())
                .build()
        })
        .collect()
}
