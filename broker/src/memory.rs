//! In-process broker with durable queues.
//!
//! Topics fan out to queues; each queue is an unbounded FIFO that survives
//! consumers coming and going. This is the broker every test and the default
//! single-binary deployment run on.

use futures::Stream;
use railseat_core::event::SerializedEvent;
use railseat_core::event_bus::{EventBus, EventBusError, EventStream};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

type Receiver = mpsc::UnboundedReceiver<SerializedEvent>;

struct Queue {
    tx: mpsc::UnboundedSender<SerializedEvent>,
    /// `None` while a consumer holds the stream.
    rx: Option<Receiver>,
    enqueued: Arc<AtomicU64>,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Some(rx),
            enqueued: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, Queue>,
    /// topic -> queues bound to it, in declaration order
    bindings: HashMap<String, Vec<String>>,
}

/// In-memory topic/queue broker.
///
/// - [`bind`](Self::bind) creates a queue and binds it to topics.
///   Events published to a topic before any queue is bound to it are dropped,
///   like an exchange with no bindings.
/// - A queue buffers events while nobody is attached.
/// - Only one stream per queue at a time. Dropping the stream hands the
///   undelivered remainder back to the queue.
///
/// Cloning shares the same broker.
///
/// # Example
///
/// ```
/// use railseat_broker::InMemoryBroker;
/// use railseat_core::event::SerializedEvent;
/// use railseat_core::event_bus::EventBus;
/// use futures::StreamExt;
///
/// # tokio_test::block_on(async {
/// let broker = InMemoryBroker::new();
/// broker.bind("seat-service.reservations", &["reservation.requested"]);
///
/// let event = SerializedEvent::new("ReservationRequested.v1".into(), b"{}".to_vec(), None);
/// broker.publish("reservation.requested", &event).await.unwrap();
///
/// let mut stream = broker
///     .subscribe("seat-service.reservations", &["reservation.requested"])
///     .await
///     .unwrap();
/// assert_eq!(stream.next().await.unwrap().unwrap(), event);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `queue` if needed and bind it to `topics`. Idempotent.
    pub fn bind(&self, queue: &str, topics: &[&str]) {
        let mut state = self.lock();
        state
            .queues
            .entry(queue.to_string())
            .or_insert_with(Queue::new);

        for topic in topics {
            let bound = state.bindings.entry((*topic).to_string()).or_default();
            if !bound.iter().any(|q| q == queue) {
                bound.push(queue.to_string());
                tracing::debug!(queue = %queue, topic = %topic, "Queue bound to topic");
            }
        }
    }

    /// Total events ever enqueued on `queue` (0 for an unknown queue).
    #[must_use]
    pub fn enqueued(&self, queue: &str) -> u64 {
        self.lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.enqueued.load(Ordering::SeqCst))
    }

    /// Names of every declared queue.
    #[must_use]
    pub fn queues(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().queues.keys().cloned().collect();
        names.sort();
        names
    }
}

impl EventBus for InMemoryBroker {
    fn declare(
        &self,
        queue: &str,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        self.bind(queue, topics);
        Box::pin(async { Ok(()) })
    }

    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let result = {
            let state = self.lock();
            let targets = state.bindings.get(topic).map_or(&[][..], Vec::as_slice);

            if targets.is_empty() {
                tracing::debug!(topic = %topic, "No queue bound to topic, event dropped");
            }

            targets.iter().try_for_each(|name| {
                let queue = state.queues.get(name).ok_or_else(|| EventBusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: format!("queue '{name}' bound but not declared"),
                })?;
                queue
                    .tx
                    .send(event.clone())
                    .map_err(|e| EventBusError::PublishFailed {
                        topic: topic.to_string(),
                        reason: e.to_string(),
                    })?;
                queue.enqueued.fetch_add(1, Ordering::SeqCst);
                tracing::trace!(topic = %topic, queue = %name, event_type = %event.event_type, "Event enqueued");
                Ok::<(), EventBusError>(())
            })
        };

        Box::pin(async move { result })
    }

    fn subscribe(
        &self,
        queue: &str,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        self.bind(queue, topics);

        let result = self
            .lock()
            .queues
            .get_mut(queue)
            .and_then(|q| q.rx.take())
            .map(|rx| {
                tracing::debug!(queue = %queue, "Consumer attached");
                Box::pin(QueueStream {
                    rx: Some(rx),
                    home: Arc::downgrade(&self.state),
                    queue: queue.to_string(),
                }) as EventStream
            })
            .ok_or_else(|| EventBusError::SubscriptionFailed {
                queue: queue.to_string(),
                topics: topics.iter().map(ToString::to_string).collect(),
                reason: "queue already has a consumer attached".to_string(),
            });

        Box::pin(async move { result })
    }
}

/// Stream over one queue; returns the receiver to the queue on drop.
struct QueueStream {
    rx: Option<Receiver>,
    home: Weak<Mutex<BrokerState>>,
    queue: String,
}

impl Stream for QueueStream {
    type Item = Result<SerializedEvent, EventBusError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().rx.as_mut() {
            Some(rx) => rx.poll_recv(cx).map(|event| event.map(Ok)),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for QueueStream {
    fn drop(&mut self) {
        let (Some(rx), Some(home)) = (self.rx.take(), self.home.upgrade()) else {
            return;
        };
        let mut state = home.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = state.queues.get_mut(&self.queue) {
            queue.rx = Some(rx);
            tracing::debug!(queue = %self.queue, "Consumer detached, queue retained");
        }
    }
}
