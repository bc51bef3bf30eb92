//! # Railseat Runtime
//!
//! The `Store` that owns one service's state.
//!
//! Each service keeps its rows in a `Store`. Every action runs through the
//! reducer while the store holds a write lock, which is the local
//! transaction the reservation protocol relies on: two concurrent requests
//! against the same seat serialize here, and exactly one of them sees the
//! seat free.
//!
//! ## Example
//!
//! ```ignore
//! use railseat_runtime::Store;
//!
//! let store = Store::new(SeatState::default(), SeatReducer, env);
//!
//! // Dispatch and read the outcome under the same lock
//! let (outcome, _handle) = store
//!     .send_and_inspect(SeatAction::ReserveSeat { target }, SeatState::last_outcome)
//!     .await;
//!
//! // Read state
//! let count = store.state(|s| s.len()).await;
//! ```

use railseat_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Backoff policy for publish effects
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

pub use retry::RetryPolicy;

/// Handle for tracking effect completion.
///
/// Returned by [`Store::send`]. Waiting on it returns once every effect the
/// action produced has finished, including the reduction of any feedback
/// action those effects dispatched.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: counter shared by every effect spawned for one action.
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: decrements the effect counter on drop, panics included.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, DecrementGuard, Duration, Effect, EffectHandle, EffectTracking, Reducer,
        RetryPolicy, RwLock,
    };
    use crate::metrics::EventBusMetrics;
    use railseat_core::effect::EventBusOperation;

    /// The Store - runtime coordinator for a reducer
    ///
    /// Holds state behind a `RwLock`, runs the reducer under the write lock
    /// and executes the returned effects in spawned tasks. Actions produced
    /// by effects are fed back into the same store.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        retry_policy: RetryPolicy,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_retry_policy(initial_state, reducer, environment, RetryPolicy::default())
        }

        /// Create a new Store with a custom retry policy for publish effects
        #[must_use]
        pub fn with_retry_policy(
            initial_state: S,
            reducer: R,
            environment: E,
            retry_policy: RetryPolicy,
        ) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                retry_policy,
            }
        }

        /// Send an action to the store.
        ///
        /// The reducer runs while holding the write lock; effects start after
        /// the lock is released. Returns once effects are started, not
        /// finished.
        pub async fn send(&self, action: A) -> EffectHandle {
            let ((), handle) = self.send_and_inspect(action, |_| ()).await;
            handle
        }

        /// Send an action and read state in the same critical section.
        ///
        /// `inspect` runs right after the reducer, before the write lock is
        /// released, so its result reflects exactly this action. Services use
        /// it to read the outcome of a check-then-set mutation.
        #[tracing::instrument(skip_all, name = "store_send")]
        pub async fn send_and_inspect<F, T>(&self, action: A, inspect: F) -> (T, EffectHandle)
        where
            F: FnOnce(&S) -> T,
        {
            metrics::counter!("store_commands_total").increment(1);
            let (handle, tracking) = EffectHandle::new();

            let (effects, inspected) = {
                let mut state = self.state.write().await;

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                metrics::histogram!("store_reducer_duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!(effects = effects.len(), "Reducer completed");
                (effects, inspect(&state))
            };

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            (inspected, handle)
        }

        /// Read current state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Dispatch an action produced by an effect.
        async fn feed_back(&self, action: A) {
            let mut handle = self.send(action).await;
            handle.wait().await;
        }

        #[allow(clippy::needless_pass_by_value)]
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    metrics::counter!("store_effects_executed_total", "type" => "none")
                        .increment(1);
                },
                Effect::PublishEvent(op) => {
                    metrics::counter!("store_effects_executed_total", "type" => "publish_event")
                        .increment(1);
                    tracking.increment();
                    let guard = DecrementGuard(tracking);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;
                        if let Some(action) = store.publish(op).await {
                            store.feed_back(action).await;
                        }
                    });
                },
            }
        }

        async fn publish(&self, op: EventBusOperation<A>) -> Option<A> {
            let EventBusOperation::Publish {
                event_bus,
                topic,
                event,
                on_success,
                on_error,
            } = op;

            let mut attempt: u32 = 0;
            loop {
                let start = std::time::Instant::now();
                match event_bus.publish(&topic, &event).await {
                    Ok(()) => {
                        EventBusMetrics::record_publish(start.elapsed());
                        tracing::debug!(topic = %topic, event_type = %event.event_type, "Event published");
                        return on_success(());
                    },
                    Err(error) => {
                        EventBusMetrics::record_publish_error();
                        attempt += 1;
                        if !self.retry_policy.should_retry(attempt) {
                            tracing::error!(
                                topic = %topic,
                                attempts = attempt,
                                error = %error,
                                "Publish failed after exhausting retries"
                            );
                            return on_error(error);
                        }

                        let delay: Duration = self.retry_policy.delay_for_attempt(attempt - 1);
                        tracing::warn!(
                            topic = %topic,
                            attempt = attempt,
                            delay_ms = delay.as_millis(),
                            error = %error,
                            "Publish failed, retrying after delay"
                        );
                        tokio::time::sleep(delay).await;
                    },
                }
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                retry_policy: self.retry_policy.clone(),
            }
        }
    }
}

pub use store::Store;
