//! Durable-queue consumer with automatic reattach.
//!
//! ```text
//! loop {
//!     subscribe(queue, topics)
//!         for each delivery, one at a time:
//!             handler.handle(event)   // errors are logged, never fatal
//!         stream ended → wait retry_delay, subscribe again
//!     shutdown → stop
//! }
//! ```
//!
//! One consumer drains one queue and awaits the handler before pulling the
//! next delivery, so events reach the handler in queue order. Per-seat
//! ordering therefore holds exactly as far as the transport keeps one seat's
//! events in order within a queue.

use super::handlers::EventHandler;
use futures::StreamExt;
use railseat_core::event::SerializedEvent;
use railseat_core::event_bus::{EventBus, EventBusError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// A consumer was built without a required part.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event consumer is missing its {0}")]
pub struct MissingPart(pub &'static str);

/// Number of deliveries a consumer has finished with, successful or not.
#[derive(Clone, Debug, Default)]
pub struct ConsumerProgress {
    handled: Arc<AtomicU64>,
}

impl ConsumerProgress {
    /// Deliveries handled so far.
    #[must_use]
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::SeqCst)
    }

    fn advance(&self) {
        self.handled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Consumer for one durable queue.
pub struct EventConsumer {
    name: String,
    queue: String,
    topics: Vec<String>,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
    progress: ConsumerProgress,
}

impl EventConsumer {
    /// Start configuring a consumer.
    #[must_use]
    pub fn builder() -> EventConsumerBuilder {
        EventConsumerBuilder::default()
    }

    /// Consumer name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue this consumer drains.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Shared progress counter, readable after the consumer is spawned.
    #[must_use]
    pub fn progress(&self) -> ConsumerProgress {
        self.progress.clone()
    }

    /// Run the consumer on its own task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, queue = %self.queue, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal");
                    break;
                }
                subscribed = self.event_bus.subscribe(&self.queue, &topics) => {
                    match subscribed {
                        Ok(mut stream) => {
                            info!(consumer = %self.name, queue = %self.queue, topics = ?self.topics, "Attached to queue");
                            if self.process_stream(&mut stream).await.is_break() {
                                break;
                            }
                            warn!(consumer = %self.name, "Event stream ended, reattaching in {:?}", self.retry_delay);
                        }
                        Err(e) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                "Failed to attach to queue, retrying in {:?}",
                                self.retry_delay
                            );
                        }
                    }
                }
            }

            tokio::select! {
                _ = self.shutdown.recv() => break,
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    /// Drain the stream; `Break` on shutdown, `Continue` when the stream ends.
    async fn process_stream<S>(&mut self, stream: &mut S) -> std::ops::ControlFlow<()>
    where
        S: futures::Stream<Item = Result<SerializedEvent, EventBusError>> + Unpin + Send,
    {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal during processing");
                    return std::ops::ControlFlow::Break(());
                }
                delivery = stream.next() => {
                    match delivery {
                        Some(Ok(event)) => {
                            if let Err(e) = self.handler.handle(&event).await {
                                error!(
                                    consumer = %self.name,
                                    event_type = %event.event_type,
                                    error = %e,
                                    "Failed to handle event"
                                );
                            }
                            self.progress.advance();
                        }
                        Some(Err(e)) => {
                            error!(consumer = %self.name, error = %e, "Error receiving event from queue");
                            self.progress.advance();
                        }
                        None => {
                            warn!(consumer = %self.name, "Event stream ended");
                            return std::ops::ControlFlow::Continue(());
                        }
                    }
                }
            }
        }
    }
}

/// Builder for [`EventConsumer`].
#[derive(Default)]
pub struct EventConsumerBuilder {
    name: Option<String>,
    queue: Option<String>,
    topics: Vec<String>,
    event_bus: Option<Arc<dyn EventBus>>,
    handler: Option<Arc<dyn EventHandler>>,
    shutdown: Option<broadcast::Receiver<()>>,
    retry_delay: Option<Duration>,
}

impl EventConsumerBuilder {
    /// Consumer name; defaults to the queue name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Durable queue to drain.
    #[must_use]
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Topic the queue is bound to. May be called more than once.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.push(topic.into());
        self
    }

    /// Event bus instance.
    #[must_use]
    pub fn event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Event handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Delay before reattaching (default: 1 second).
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Build the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`MissingPart`] when the queue, a topic, the event bus, the
    /// handler or the shutdown receiver was not set.
    pub fn build(self) -> Result<EventConsumer, MissingPart> {
        let queue = self.queue.ok_or(MissingPart("queue"))?;
        if self.topics.is_empty() {
            return Err(MissingPart("topics"));
        }

        Ok(EventConsumer {
            name: self.name.unwrap_or_else(|| queue.clone()),
            queue,
            topics: self.topics,
            event_bus: self.event_bus.ok_or(MissingPart("event bus"))?,
            handler: self.handler.ok_or(MissingPart("handler"))?,
            shutdown: self.shutdown.ok_or(MissingPart("shutdown receiver"))?,
            retry_delay: self.retry_delay.unwrap_or_else(|| Duration::from_secs(1)),
            progress: ConsumerProgress::default(),
        })
    }
}
