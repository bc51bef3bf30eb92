//! Train inventory aggregate.
//!
//! Owns the available-seat counter of every train run. Relative adjustments
//! move the counter by exactly one and clamp at `0` and at `total_seats`;
//! a clamped adjustment still succeeds but is reported.

use crate::error::{Entity, ReservationError};
use crate::types::{Clamp, TrainId, TrainRun};
use railseat_core::{SmallVec, effect::Effect, reducer::Reducer};
use std::collections::BTreeMap;

// ============================================================================
// State
// ============================================================================

/// Train runs by id, plus the outcome of the last command.
#[derive(Clone, Debug, Default)]
pub struct TrainState {
    /// Every registered run
    pub trains: BTreeMap<TrainId, TrainRun>,
    /// Result of the most recent command
    pub last_outcome: Option<Result<TrainRun, ReservationError>>,
    /// Set when the most recent adjustment hit a bound
    pub last_clamp: Option<Clamp>,
}

impl TrainState {
    /// Create empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome of the last command together with its clamp, if any.
    #[must_use]
    pub fn last_adjustment(&self) -> Option<(Result<TrainRun, ReservationError>, Option<Clamp>)> {
        self.last_outcome
            .clone()
            .map(|outcome| (outcome, self.last_clamp))
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Direction of a relative adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adjustment {
    /// One seat taken
    Decrement,
    /// One seat given back
    Increment,
}

/// Actions for the train inventory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrainAction {
    // Commands
    /// Add a train run (seeding only; schedules are not authored here)
    RegisterTrain {
        /// The run
        train: TrainRun,
    },

    /// Administrative absolute set of the counter
    SetAvailableSeats {
        /// Train run
        train_id: TrainId,
        /// New counter value, at most `total_seats`
        available_seats: u32,
    },

    /// Move the counter by one
    AdjustAvailableSeats {
        /// Train run
        train_id: TrainId,
        /// Which way
        adjustment: Adjustment,
    },

    // Events
    /// A train run was added
    TrainRegistered {
        /// The run
        train: TrainRun,
    },

    /// The counter changed (or hit a bound)
    AvailableSeatsChanged {
        /// Train run
        train_id: TrainId,
        /// New value
        available_seats: u32,
        /// Set when the adjustment was clamped
        clamped: Option<Clamp>,
    },

    /// A command was refused
    TrainRejected {
        /// Why
        error: ReservationError,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// The train inventory needs no injected dependencies.
#[derive(Clone, Debug, Default)]
pub struct TrainEnvironment;

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the train inventory.
#[derive(Clone, Debug, Default)]
pub struct TrainReducer;

impl TrainReducer {
    /// Creates a new `TrainReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_register(state: &TrainState, train: &TrainRun) -> Result<(), ReservationError> {
        if state.trains.contains_key(&train.id) {
            return Err(ReservationError::InvalidInput(format!(
                "train {} already exists",
                train.id
            )));
        }
        if train.available_seats > train.total_seats {
            return Err(ReservationError::InvalidInput(format!(
                "available seats {} exceed capacity {}",
                train.available_seats, train.total_seats
            )));
        }
        if train.arrival_time < train.departure_time {
            return Err(ReservationError::InvalidInput(
                "arrival precedes departure".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_set(
        state: &TrainState,
        train_id: TrainId,
        available_seats: u32,
    ) -> Result<(), ReservationError> {
        let train = state
            .trains
            .get(&train_id)
            .ok_or(ReservationError::NotFound(Entity::Train))?;

        if available_seats > train.total_seats {
            return Err(ReservationError::InvalidInput(format!(
                "available seats {available_seats} exceed capacity {}",
                train.total_seats
            )));
        }
        Ok(())
    }

    /// New counter value and whether a bound was hit.
    fn adjusted(train: &TrainRun, adjustment: Adjustment) -> (u32, Option<Clamp>) {
        match adjustment {
            Adjustment::Decrement => match train.available_seats.checked_sub(1) {
                Some(value) => (value, None),
                None => (0, Some(Clamp::Floor)),
            },
            Adjustment::Increment => {
                if train.available_seats >= train.total_seats {
                    (train.total_seats, Some(Clamp::Ceiling))
                } else {
                    (train.available_seats + 1, None)
                }
            },
        }
    }

    /// Applies an event to state
    fn apply_event(state: &mut TrainState, action: &TrainAction) {
        match action {
            TrainAction::TrainRegistered { train } => {
                state.trains.insert(train.id, train.clone());
                state.last_outcome = Some(Ok(train.clone()));
                state.last_clamp = None;
            },

            TrainAction::AvailableSeatsChanged {
                train_id,
                available_seats,
                clamped,
            } => {
                if let Some(train) = state.trains.get_mut(train_id) {
                    train.available_seats = *available_seats;
                    state.last_outcome = Some(Ok(train.clone()));
                    state.last_clamp = *clamped;
                }
            },

            TrainAction::TrainRejected { error } => {
                state.last_outcome = Some(Err(error.clone()));
                state.last_clamp = None;
            },

            // Commands don't modify state
            TrainAction::RegisterTrain { .. }
            | TrainAction::SetAvailableSeats { .. }
            | TrainAction::AdjustAvailableSeats { .. } => {},
        }
    }
}

impl Reducer for TrainReducer {
    type State = TrainState;
    type Action = TrainAction;
    type Environment = TrainEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let event = match action {
            // ========== Commands ==========
            TrainAction::RegisterTrain { train } => match Self::validate_register(state, &train) {
                Ok(()) => TrainAction::TrainRegistered { train },
                Err(error) => TrainAction::TrainRejected { error },
            },

            TrainAction::SetAvailableSeats {
                train_id,
                available_seats,
            } => match Self::validate_set(state, train_id, available_seats) {
                Ok(()) => TrainAction::AvailableSeatsChanged {
                    train_id,
                    available_seats,
                    clamped: None,
                },
                Err(error) => TrainAction::TrainRejected { error },
            },

            TrainAction::AdjustAvailableSeats {
                train_id,
                adjustment,
            } => match state.trains.get(&train_id) {
                Some(train) => {
                    let (available_seats, clamped) = Self::adjusted(train, adjustment);
                    if let Some(clamp) = clamped {
                        tracing::warn!(
                            train_id = %train_id,
                            adjustment = ?adjustment,
                            bound = clamp.as_str(),
                            "Available seat counter clamped"
                        );
                    }
                    TrainAction::AvailableSeatsChanged {
                        train_id,
                        available_seats,
                        clamped,
                    }
                },
                None => TrainAction::TrainRejected {
                    error: ReservationError::NotFound(Entity::Train),
                },
            },

            // ========== Events ==========
            event @ (TrainAction::TrainRegistered { .. }
            | TrainAction::AvailableSeatsChanged { .. }
            | TrainAction::TrainRejected { .. }) => event,
        };

        Self::apply_event(state, &event);
        SmallVec::new()
    }
}
