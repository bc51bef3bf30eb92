//! Given-When-Then harness for the service reducers.
//!
//! Besides plain state and effect checks, a test can settle the publish
//! effects the reducer returned: [`ReducerTest::publish_accepted`] and
//! [`ReducerTest::publish_rejected`] run each effect's callback and reduce
//! the feedback action before the state assertions. That is how a rollback
//! after a failed publish is checked without a runtime or a broker.

#![allow(clippy::module_name_repetitions)]

use railseat_core::effect::{Effect, EventBusOperation};
use railseat_core::event_bus::EventBusError;
use railseat_core::reducer::Reducer;

type StateAssertion<S> = Box<dyn FnOnce(&S)>;
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// What the bus answers to the publish effects of the action under test.
enum Settle {
    Leave,
    Accept,
    Reject(String),
}

/// Given-When-Then test for one reducer action.
///
/// # Example
///
/// ```ignore
/// use railseat_testing::{ReducerTest, assertions};
///
/// ReducerTest::new(TrainReducer::new())
///     .with_env(TrainEnvironment)
///     .given_state(state_with_train(100, 10))
///     .when_action(TrainAction::AdjustAvailableSeats {
///         train_id: TrainId::new(100),
///         adjustment: Adjustment::Decrement,
///     })
///     .then_state(|state| {
///         assert_eq!(state.trains[&TrainId::new(100)].available_seats, 9);
///     })
///     .then_effects(assertions::assert_no_effects)
///     .run();
/// ```
pub struct ReducerTest<R: Reducer> {
    reducer: R,
    environment: Option<R::Environment>,
    initial_state: Option<R::State>,
    history: Vec<R::Action>,
    action: Option<R::Action>,
    settle: Settle,
    state_assertions: Vec<StateAssertion<R::State>>,
    effect_assertions: Vec<EffectAssertion<R::Action>>,
}

impl<R: Reducer> ReducerTest<R> {
    /// Test `reducer`.
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            history: Vec::new(),
            action: None,
            settle: Settle::Leave,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Environment passed to every reduction.
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Starting state (Given).
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// An action reduced before the one under test; its effects are dropped.
    #[must_use]
    pub fn given_action(mut self, action: R::Action) -> Self {
        self.history.push(action);
        self
    }

    /// The action under test (When).
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.action = Some(action);
        self
    }

    /// The bus accepts every publish; success feedback is reduced.
    #[must_use]
    pub fn publish_accepted(mut self) -> Self {
        self.settle = Settle::Accept;
        self
    }

    /// The bus rejects every publish with `reason`; failure feedback is
    /// reduced.
    #[must_use]
    pub fn publish_rejected(mut self, reason: impl Into<String>) -> Self {
        self.settle = Settle::Reject(reason.into());
        self
    }

    /// Check the state after the action and any publish feedback (Then).
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Check the effects the action returned (Then).
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<R::Action>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Reduce and run every assertion.
    ///
    /// # Panics
    ///
    /// Panics if the state, action or environment is missing, or an
    /// assertion fails.
    #[allow(clippy::expect_used)]
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        let action = self.action.expect("Action must be set with when_action()");
        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        for past in self.history {
            let _ = self.reducer.reduce(&mut state, past, &env);
        }

        let effects = self.reducer.reduce(&mut state, action, &env);
        for assertion in self.effect_assertions {
            assertion(&effects);
        }

        if !matches!(self.settle, Settle::Leave) {
            let feedback: Vec<R::Action> = effects
                .into_iter()
                .filter_map(|effect| settle(effect, &self.settle))
                .collect();
            for action in feedback {
                let _ = self.reducer.reduce(&mut state, action, &env);
            }
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }
    }
}

fn settle<A>(effect: Effect<A>, outcome: &Settle) -> Option<A> {
    let Effect::PublishEvent(EventBusOperation::Publish {
        topic,
        on_success,
        on_error,
        ..
    }) = effect
    else {
        return None;
    };

    match outcome {
        Settle::Leave => None,
        Settle::Accept => on_success(()),
        Settle::Reject(reason) => on_error(EventBusError::PublishFailed {
            topic,
            reason: reason.clone(),
        }),
    }
}

/// Effect assertions.
pub mod assertions {
    use railseat_core::effect::Effect;

    /// Nothing to execute: no effects, or a lone `Effect::None`.
    ///
    /// # Panics
    ///
    /// Panics otherwise.
    pub fn assert_no_effects<A>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "Expected no effects, but found {effects:?}"
        );
    }

    /// The topics published, in effect order.
    ///
    /// # Panics
    ///
    /// Panics if the published topics differ from `expected`.
    pub fn assert_published_topics<A>(effects: &[Effect<A>], expected: &[&str]) {
        let topics: Vec<&str> = effects.iter().filter_map(Effect::published_topic).collect();
        assert_eq!(topics, expected, "Unexpected published topics");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingEventBus;
    use railseat_core::event::SerializedEvent;
    use railseat_core::event_bus::EventBus;
    use railseat_core::{SmallVec, publish_event, smallvec};
    use std::sync::Arc;

    const HOLDS: &str = "holds";

    #[derive(Clone, Debug, Default)]
    struct Holds {
        held: Vec<u32>,
    }

    #[derive(Clone, Debug)]
    enum HoldAction {
        Hold(u32),
        Release(u32),
    }

    struct HoldReducer;

    struct HoldEnv {
        bus: Arc<dyn EventBus>,
    }

    impl Reducer for HoldReducer {
        type State = Holds;
        type Action = HoldAction;
        type Environment = HoldEnv;

        fn reduce(
            &self,
            state: &mut Holds,
            action: HoldAction,
            env: &HoldEnv,
        ) -> SmallVec<[Effect<HoldAction>; 4]> {
            match action {
                HoldAction::Hold(n) => {
                    state.held.push(n);
                    let event = SerializedEvent::new("Held.v1".to_string(), vec![], None);
                    smallvec![publish_event! {
                        bus: env.bus,
                        topic: HOLDS,
                        event: event,
                        on_success: || None,
                        on_error: |_error| Some(HoldAction::Release(n))
                    }]
                },
                HoldAction::Release(n) => {
                    state.held.retain(|held| *held != n);
                    smallvec![]
                },
            }
        }
    }

    fn env() -> HoldEnv {
        HoldEnv {
            bus: Arc::new(RecordingEventBus::new()),
        }
    }

    #[test]
    fn history_is_applied_before_the_action() {
        ReducerTest::new(HoldReducer)
            .with_env(env())
            .given_state(Holds::default())
            .given_action(HoldAction::Hold(1))
            .when_action(HoldAction::Hold(2))
            .then_state(|state| assert_eq!(state.held, vec![1, 2]))
            .then_effects(|effects| assertions::assert_published_topics(effects, &[HOLDS]))
            .run();
    }

    #[test]
    fn rejected_publish_reduces_the_rollback() {
        ReducerTest::new(HoldReducer)
            .with_env(env())
            .given_state(Holds::default())
            .when_action(HoldAction::Hold(1))
            .publish_rejected("broker down")
            .then_state(|state| assert!(state.held.is_empty()))
            .run();
    }

    #[test]
    fn accepted_publish_keeps_the_change() {
        ReducerTest::new(HoldReducer)
            .with_env(env())
            .given_state(Holds::default())
            .when_action(HoldAction::Hold(1))
            .publish_accepted()
            .then_state(|state| assert_eq!(state.held, vec![1]))
            .run();
    }

    #[test]
    fn release_has_no_effects() {
        ReducerTest::new(HoldReducer)
            .with_env(env())
            .given_state(Holds { held: vec![3] })
            .when_action(HoldAction::Release(3))
            .then_state(|state| assert!(state.held.is_empty()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
