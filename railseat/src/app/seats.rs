//! Seat store service.

use super::collaborators::SeatLookup;
use crate::aggregates::{SeatAction, SeatEnvironment, SeatReducer, SeatState};
use crate::error::{Entity, ReservationError, ReservationResult};
use crate::types::{Seat, SeatId, SeatRef, TrainId};
use async_trait::async_trait;
use railseat_core::environment::Clock;
use railseat_runtime::Store;
use std::sync::Arc;

type SeatStore = Store<SeatState, SeatAction, SeatEnvironment, SeatReducer>;

/// Owns every seat row. Cheap to clone; clones share the rows.
#[derive(Clone)]
pub struct SeatService {
    store: SeatStore,
}

impl SeatService {
    /// Empty seat store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Store::new(SeatState::new(), SeatReducer::new(), SeatEnvironment::new(clock)),
        }
    }

    async fn dispatch(&self, action: SeatAction) -> ReservationResult<Seat> {
        let (outcome, _handle) = self
            .store
            .send_and_inspect(action, SeatState::last_outcome)
            .await;
        outcome.ok_or_else(|| ReservationError::Unavailable("seat store gave no outcome".into()))?
    }

    /// Add a free seat.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a duplicate id or position.
    pub async fn register(
        &self,
        id: SeatId,
        train_id: TrainId,
        seat_number: impl Into<String>,
    ) -> ReservationResult<Seat> {
        self.dispatch(SeatAction::RegisterSeat {
            id,
            train_id,
            seat_number: seat_number.into(),
        })
        .await
    }

    /// Seats of one train in id order.
    ///
    /// # Errors
    ///
    /// `NotFound(seat)` when the train has no seats.
    pub async fn list_by_train(&self, train_id: TrainId) -> ReservationResult<Vec<Seat>> {
        let seats = self.store.state(|s| s.by_train(train_id)).await;
        if seats.is_empty() {
            return Err(ReservationError::NotFound(Entity::Seat));
        }
        Ok(seats)
    }

    /// One seat by id or position.
    ///
    /// # Errors
    ///
    /// `NotFound(seat)`.
    pub async fn get(&self, seat: &SeatRef) -> ReservationResult<Seat> {
        self.store
            .state(|s| s.resolve(seat).cloned())
            .await
            .ok_or(ReservationError::NotFound(Entity::Seat))
    }

    /// Set the reserved flag.
    ///
    /// # Errors
    ///
    /// `NotFound(seat)`, or `Conflict(seat already reserved)` when the flag is
    /// already set.
    pub async fn reserve(&self, seat: SeatRef) -> ReservationResult<Seat> {
        self.dispatch(SeatAction::ReserveSeat { seat }).await
    }

    /// Clear the reserved flag.
    ///
    /// # Errors
    ///
    /// `NotFound(seat)`, or `Conflict(seat not reserved)` when the flag is
    /// already clear.
    pub async fn cancel(&self, seat: SeatRef) -> ReservationResult<Seat> {
        self.dispatch(SeatAction::CancelSeat { seat }).await
    }
}

#[async_trait]
impl SeatLookup for SeatService {
    async fn seats_for_train(&self, train_id: TrainId) -> ReservationResult<Vec<Seat>> {
        self.list_by_train(train_id).await
    }
}
