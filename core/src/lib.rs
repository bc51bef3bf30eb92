//! # Railseat Core
//!
//! Shared abstractions for the Railseat services.
//!
//! Every service (seat store, train inventory, user directory, reservation
//! orchestrator) is written the same way:
//!
//! - **State**: the rows a service owns
//! - **Action**: commands plus the facts they produce
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a description of I/O, executed by the runtime `Store`
//! - **Environment**: injected dependencies (clock, event bus)
//!
//! Services never share state. They talk through the [`event_bus::EventBus`]
//! and through synchronous collaborator traits defined by the domain crate.
//!
//! ## Example
//!
//! ```ignore
//! use railseat_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for SeatReducer {
//!     type State = SeatState;
//!     type Action = SeatAction;
//!     type Environment = SeatEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut SeatState,
//!         action: SeatAction,
//!         env: &SeatEnvironment,
//!     ) -> SmallVec<[Effect<SeatAction>; 4]> {
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod event;
pub mod event_bus;

mod effect_macros;

/// The reducer trait.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// Business logic for one service.
    ///
    /// A reducer validates an action, mutates state in place and returns the
    /// effects the runtime should execute afterwards. It performs no I/O of
    /// its own, which is what lets the runtime run it under the state lock.
    ///
    /// Most reducers return zero to two effects, so the return type is a
    /// `SmallVec` that stays on the stack in the common case.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Side effect descriptions.
pub mod effect {
    use crate::event::SerializedEvent;
    use crate::event_bus::{EventBus, EventBusError};
    use std::sync::Arc;

    /// Callback invoked after a publish attempt, possibly producing a feedback action.
    pub type PublishCallback<T, Action> = Box<dyn FnOnce(T) -> Option<Action> + Send>;

    /// Event bus operations an effect can request.
    pub enum EventBusOperation<Action> {
        /// Publish one event to a topic.
        Publish {
            /// Bus to publish on
            event_bus: Arc<dyn EventBus>,
            /// Topic (routing key)
            topic: String,
            /// Event to publish
            event: SerializedEvent,
            /// Called once the bus accepted the event
            on_success: PublishCallback<(), Action>,
            /// Called when the bus rejected the event after retries
            on_error: PublishCallback<EventBusError, Action>,
        },
    }

    /// A side effect to be executed by the runtime.
    ///
    /// Effects are values. Reducers return them and the `Store` executes them
    /// after releasing the state lock. Any action an effect produces is fed
    /// back into the same store.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Publish a domain event
        PublishEvent(EventBusOperation<Action>),
    }

    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::PublishEvent(EventBusOperation::Publish { topic, event, .. }) => f
                    .debug_struct("Effect::PublishEvent")
                    .field("topic", topic)
                    .field("event_type", &event.event_type)
                    .finish_non_exhaustive(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Topic of a publish effect, if this is one.
        #[must_use]
        pub fn published_topic(&self) -> Option<&str> {
            match self {
                Effect::PublishEvent(EventBusOperation::Publish { topic, .. }) => {
                    Some(topic.as_str())
                },
                Effect::None => None,
            }
        }
    }
}

/// Injected dependencies.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of "now" for reducers.
    ///
    /// Production code uses [`SystemClock`]; tests use a fixed clock so that
    /// timestamps on reservations and events are reproducible.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn none_publishes_nothing() {
        let effect: Effect<u8> = Effect::None;
        assert_eq!(format!("{effect:?}"), "Effect::None");
        assert!(effect.published_topic().is_none());
    }
}
