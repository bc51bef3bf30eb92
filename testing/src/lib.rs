//! # Railseat Testing
//!
//! Testing utilities for Railseat services.
//!
//! This crate provides:
//! - A fixed clock for reproducible timestamps
//! - A recording event bus that captures publishes and can inject failures
//!   or duplicate deliveries
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use railseat_testing::{RecordingEventBus, test_clock};
//!
//! #[tokio::test]
//! async fn cancel_announces_event() {
//!     let bus = Arc::new(RecordingEventBus::new());
//!     let app = Railseat::in_process(test_clock(), bus.clone());
//!
//!     app.reservations.cancel(reservation_id).await?;
//!
//!     assert_eq!(bus.topics(), vec!["reservation.cancelled"]);
//! }
//! ```

use chrono::{DateTime, Utc};
use railseat_core::environment::Clock;

mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use futures::future::BoxFuture;
    use railseat_core::event::SerializedEvent;
    use railseat_core::event_bus::{EventBus, EventBusError, EventStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use railseat_testing::mocks::FixedClock;
    /// use railseat_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Never in practice: the timestamp is a literal.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// One captured publish.
    #[derive(Debug, Clone, PartialEq)]
    pub struct PublishedEvent {
        /// Topic the event went to
        pub topic: String,
        /// The event as published
        pub event: SerializedEvent,
    }

    /// Event bus that records every publish.
    ///
    /// On its own it only records; subscriptions fail. Wrap a real bus with
    /// [`RecordingEventBus::wrapping`] to record and forward.
    ///
    /// Failure and duplication are switchable at runtime:
    /// - [`fail_next`](Self::fail_next) rejects the next `n` publishes
    /// - [`duplicate_deliveries`](Self::duplicate_deliveries) forwards every
    ///   event twice, which is what an at-least-once broker may do
    #[derive(Default)]
    pub struct RecordingEventBus {
        inner: Option<Arc<dyn EventBus>>,
        published: Mutex<Vec<PublishedEvent>>,
        fail_remaining: AtomicUsize,
        duplicate: std::sync::atomic::AtomicBool,
    }

    impl RecordingEventBus {
        /// A bus that records and drops.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A bus that records, then forwards to `inner`.
        #[must_use]
        pub fn wrapping(inner: Arc<dyn EventBus>) -> Self {
            Self {
                inner: Some(inner),
                ..Self::default()
            }
        }

        /// Reject the next `count` publishes with `PublishFailed`.
        pub fn fail_next(&self, count: usize) {
            self.fail_remaining.store(count, Ordering::SeqCst);
        }

        /// Forward each accepted event twice.
        pub fn duplicate_deliveries(&self, enabled: bool) {
            self.duplicate.store(enabled, Ordering::SeqCst);
        }

        /// Everything accepted so far, in publish order.
        #[must_use]
        pub fn published(&self) -> Vec<PublishedEvent> {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Topics of accepted publishes, in order.
        #[must_use]
        pub fn topics(&self) -> Vec<String> {
            self.published().into_iter().map(|p| p.topic).collect()
        }

        /// Forget everything recorded.
        pub fn clear(&self) {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }

        fn take_failure(&self) -> bool {
            self.fail_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    impl EventBus for RecordingEventBus {
        fn publish(
            &self,
            topic: &str,
            event: &SerializedEvent,
        ) -> BoxFuture<'_, Result<(), EventBusError>> {
            let topic = topic.to_string();
            let event = event.clone();

            Box::pin(async move {
                if self.take_failure() {
                    return Err(EventBusError::PublishFailed {
                        topic,
                        reason: "injected failure".to_string(),
                    });
                }

                if let Some(inner) = &self.inner {
                    inner.publish(&topic, &event).await?;
                    if self.duplicate.load(Ordering::SeqCst) {
                        inner.publish(&topic, &event).await?;
                    }
                }

                self.published
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(PublishedEvent { topic, event });
                Ok(())
            })
        }

        fn declare(
            &self,
            queue: &str,
            topics: &[&str],
        ) -> BoxFuture<'_, Result<(), EventBusError>> {
            let queue = queue.to_string();
            let topics: Vec<String> = topics.iter().map(ToString::to_string).collect();

            Box::pin(async move {
                match &self.inner {
                    Some(inner) => {
                        let refs: Vec<&str> = topics.iter().map(String::as_str).collect();
                        inner.declare(&queue, &refs).await
                    },
                    None => Ok(()),
                }
            })
        }

        fn subscribe(
            &self,
            queue: &str,
            topics: &[&str],
        ) -> BoxFuture<'_, Result<EventStream, EventBusError>> {
            let queue = queue.to_string();
            let topics: Vec<String> = topics.iter().map(ToString::to_string).collect();

            Box::pin(async move {
                match &self.inner {
                    Some(inner) => {
                        let refs: Vec<&str> = topics.iter().map(String::as_str).collect();
                        inner.subscribe(&queue, &refs).await
                    },
                    None => Err(EventBusError::SubscriptionFailed {
                        queue,
                        topics,
                        reason: "recording bus has no transport".to_string(),
                    }),
                }
            })
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, PublishedEvent, RecordingEventBus, test_clock};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use railseat_core::event::SerializedEvent;
    use railseat_core::event_bus::EventBus;

    fn event() -> SerializedEvent {
        SerializedEvent::new(
            "ReservationCancelled.v1".to_string(),
            serde_json::to_vec(&serde_json::json!({ "reservationId": 1 })).unwrap(),
            None,
        )
    }

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[tokio::test]
    async fn records_publishes_in_order() {
        let bus = RecordingEventBus::new();
        bus.publish("reservation.requested", &event()).await.unwrap();
        bus.publish("reservation.cancelled", &event()).await.unwrap();

        assert_eq!(
            bus.topics(),
            vec!["reservation.requested", "reservation.cancelled"]
        );

        bus.clear();
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_not_recorded() {
        let bus = RecordingEventBus::new();
        bus.fail_next(1);

        assert!(bus.publish("reservation.cancelled", &event()).await.is_err());
        assert!(bus.publish("reservation.cancelled", &event()).await.is_ok());
        assert_eq!(bus.published().len(), 1);
    }

    #[tokio::test]
    async fn bare_bus_cannot_subscribe() {
        let bus = RecordingEventBus::new();
        let result = bus.subscribe("q", &["reservation.requested"]).await;
        assert!(result.is_err());
    }
}
