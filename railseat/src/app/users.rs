//! User directory service.

use super::collaborators::RiderLookup;
use super::password::PasswordHasher;
use crate::aggregates::{RiderAction, RiderEnvironment, RiderReducer, RiderState};
use crate::error::{ConflictKind, Entity, ReservationError, ReservationResult};
use crate::types::{RiderId, RiderProfile};
use async_trait::async_trait;
use railseat_runtime::Store;
use serde::Deserialize;
use std::sync::Arc;

type RiderStore = Store<RiderState, RiderAction, RiderEnvironment, RiderReducer>;

/// Sign-up request.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    /// Fixed id, only honoured when seeding
    #[serde(skip)]
    pub id: Option<RiderId>,
    /// Login name
    pub username: String,
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
    /// Plaintext password
    pub password: String,
}

/// Rider identity, sign-up and login.
#[derive(Clone)]
pub struct UserDirectory {
    store: RiderStore,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserDirectory {
    /// Empty directory using `hasher` for passwords.
    #[must_use]
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            store: Store::new(RiderState::new(), RiderReducer::new(), RiderEnvironment),
            hasher,
        }
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// `Conflict(duplicate rider)` when the username is taken, `InvalidInput`
    /// for a blank username.
    pub async fn sign_up(&self, request: SignUp) -> ReservationResult<RiderProfile> {
        let action = RiderAction::SignUp {
            id: request.id,
            password_hash: self.hasher.hash(&request.password),
            username: request.username,
            name: request.name,
            email: request.email,
        };

        let (outcome, _handle) = self
            .store
            .send_and_inspect(action, |s| s.last_outcome.clone())
            .await;
        let profile = outcome
            .ok_or_else(|| ReservationError::Unavailable("user store gave no outcome".into()))??;

        tracing::info!(rider_id = %profile.id, username = %profile.username, "Rider signed up");
        Ok(profile)
    }

    /// Check credentials and return the rider id.
    ///
    /// # Errors
    ///
    /// `NotFound(rider)` for an unknown username, `Conflict(wrong
    /// credentials)` for a bad password.
    pub async fn login(&self, username: &str, password: &str) -> ReservationResult<RiderId> {
        let account = self
            .store
            .state(|s| s.by_username(username).cloned())
            .await
            .ok_or(ReservationError::NotFound(Entity::Rider))?;

        if !self.hasher.verify(password, &account.password_hash) {
            tracing::debug!(username = %username, "Login refused");
            return Err(ReservationError::Conflict(ConflictKind::WrongCredentials));
        }
        Ok(account.profile.id)
    }

    /// One rider.
    ///
    /// # Errors
    ///
    /// `NotFound(rider)`.
    pub async fn get(&self, id: RiderId) -> ReservationResult<RiderProfile> {
        self.store
            .state(|s| s.riders.get(&id).map(|a| a.profile.clone()))
            .await
            .ok_or(ReservationError::NotFound(Entity::Rider))
    }
}

#[async_trait]
impl RiderLookup for UserDirectory {
    async fn rider(&self, id: RiderId) -> ReservationResult<RiderProfile> {
        self.get(id).await
    }
}
