//! User directory aggregate.
//!
//! Riders sign up with a unique username. Password hashing happens before the
//! action reaches the reducer, so the reducer stays deterministic.

use crate::error::{ConflictKind, ReservationError};
use crate::types::{RiderAccount, RiderId, RiderProfile};
use railseat_core::{SmallVec, effect::Effect, reducer::Reducer};
use std::collections::BTreeMap;

/// Riders by id.
#[derive(Clone, Debug, Default)]
pub struct RiderState {
    /// Every registered rider
    pub riders: BTreeMap<RiderId, RiderAccount>,
    /// Result of the most recent command
    pub last_outcome: Option<Result<RiderProfile, ReservationError>>,
}

impl RiderState {
    /// Create empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find an account by username.
    #[must_use]
    pub fn by_username(&self, username: &str) -> Option<&RiderAccount> {
        self.riders
            .values()
            .find(|account| account.profile.username == username)
    }

    fn next_id(&self) -> RiderId {
        let last = self.riders.keys().next_back().map_or(0, |id| id.value());
        RiderId::new(last + 1)
    }
}

/// Actions for the user directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RiderAction {
    // Commands
    /// Create an account; `id` is assigned when absent
    SignUp {
        /// Fixed id (seeding) or `None`
        id: Option<RiderId>,
        /// Login name
        username: String,
        /// Display name
        name: String,
        /// Contact address
        email: String,
        /// Already hashed password
        password_hash: String,
    },

    // Events
    /// An account was created
    RiderRegistered {
        /// The account
        account: RiderAccount,
    },

    /// Sign-up was refused
    RiderRejected {
        /// Why
        error: ReservationError,
    },
}

/// Environment for the user directory.
#[derive(Clone, Debug, Default)]
pub struct RiderEnvironment;

/// Reducer for the user directory.
#[derive(Clone, Debug, Default)]
pub struct RiderReducer;

impl RiderReducer {
    /// Creates a new `RiderReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_sign_up(
        state: &RiderState,
        id: Option<RiderId>,
        username: &str,
    ) -> Result<(), ReservationError> {
        if username.trim().is_empty() {
            return Err(ReservationError::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }
        if state.by_username(username).is_some() {
            return Err(ReservationError::Conflict(ConflictKind::DuplicateRider));
        }
        if let Some(id) = id {
            if state.riders.contains_key(&id) {
                return Err(ReservationError::InvalidInput(format!(
                    "rider {id} already exists"
                )));
            }
        }
        Ok(())
    }

    fn apply_event(state: &mut RiderState, action: &RiderAction) {
        match action {
            RiderAction::RiderRegistered { account } => {
                state.riders.insert(account.profile.id, account.clone());
                state.last_outcome = Some(Ok(account.profile.clone()));
            },
            RiderAction::RiderRejected { error } => {
                state.last_outcome = Some(Err(error.clone()));
            },
            RiderAction::SignUp { .. } => {},
        }
    }
}

impl Reducer for RiderReducer {
    type State = RiderState;
    type Action = RiderAction;
    type Environment = RiderEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let event = match action {
            RiderAction::SignUp {
                id,
                username,
                name,
                email,
                password_hash,
            } => match Self::validate_sign_up(state, id, &username) {
                Ok(()) => RiderAction::RiderRegistered {
                    account: RiderAccount {
                        profile: RiderProfile {
                            id: id.unwrap_or_else(|| state.next_id()),
                            username,
                            name,
                            email,
                        },
                        password_hash,
                    },
                },
                Err(error) => RiderAction::RiderRejected { error },
            },
            event => event,
        };

        Self::apply_event(state, &event);
        SmallVec::new()
    }
}
