//! Publish/subscribe transport between services.
//!
//! ```text
//!   orchestrator ── publish("reservation.requested") ──┐
//!                                                      ▼
//!                        ┌───────────────── topic ─────┴───────────┐
//!                        ▼                                         ▼
//!       queue "seat-service.reservations"        queue "train-service.reservations"
//!                        │                                         │
//!                  seat consumer                            train consumer
//! ```
//!
//! # Delivery contract
//!
//! - A topic fans out to every durable queue bound to it. Each queue gets its
//!   own copy of every event published after the queue was declared.
//! - A queue keeps its events while no consumer is attached.
//! - Delivery is at-least-once. Consumers must tolerate duplicates.
//! - Order is preserved within a queue, across every topic bound to it
//!   (in-memory broker), or within a partition key of one topic (Kafka).
//!   Nothing is promised across queues.
//!
//! Consumers that need per-seat ordering rely on that last point and handle
//! one event at a time.

use crate::event::SerializedEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe a queue to topics
    #[error("Subscription failed for queue '{queue}' on topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The durable queue that was being attached
        queue: String,
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Failed to deserialize an event
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of events delivered to one queue.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// A durable publish/subscribe transport.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the bus can live behind
/// `Arc<dyn EventBus>` inside effects and consumers.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the transport rejects the event.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Declare a durable queue bound to `topics` without attaching to it.
    ///
    /// Events published after this call are kept for the queue even if no
    /// consumer is attached yet. Transports whose queues come into existence
    /// on first subscribe (Kafka consumer groups reading from the earliest
    /// offset) keep the default no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the queue cannot be declared.
    fn declare(
        &self,
        queue: &str,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let _ = (queue, topics);
        Box::pin(async { Ok(()) })
    }

    /// Attach to a durable queue bound to `topics`, declaring it if needed.
    ///
    /// Every distinct `queue` receives its own copy of each event. Attaching
    /// again to the same queue resumes where the previous stream stopped.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the queue cannot be attached.
    fn subscribe(
        &self,
        queue: &str,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
