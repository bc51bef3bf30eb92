//! Reservation orchestrator service.
//!
//! `reserve` validates against the three collaborators, writes a `PENDING`
//! row and publishes `reservation.requested`; `cancel` marks the row
//! cancelled and publishes `reservation.cancelled`. Seat and train state move
//! later, in their own consumers. Between the pre-check and the seat store's
//! own check-then-set there is a window in which two reservations for one
//! seat can both be accepted here; the seat store lets only one of them take
//! the seat.

use super::collaborators::{RiderLookup, SeatLookup, TrainLookup};
use crate::aggregates::{
    ReservationAction, ReservationEnvironment, ReservationReducer, ReservationState,
};
use crate::error::{ConflictKind, Entity, ReservationError, ReservationResult};
use crate::events::EventKind;
use crate::types::{
    Reservation, ReservationDetail, ReservationId, ReservationStatus, RiderId, Seat, TrainId,
};
use async_trait::async_trait;
use futures::future::try_join_all;
use railseat_core::environment::Clock;
use railseat_core::event_bus::EventBus;
use railseat_runtime::metrics::counter;
use railseat_runtime::{RetryPolicy, Store};
use std::sync::Arc;

type ReservationStore =
    Store<ReservationState, ReservationAction, ReservationEnvironment, ReservationReducer>;

/// The orchestrator's public operations, shared by both topologies.
#[async_trait]
pub trait ReservationDesk: Send + Sync {
    /// Reserve `seat_number` on `train_id` for `rider_id`.
    async fn reserve(
        &self,
        rider_id: RiderId,
        train_id: TrainId,
        seat_number: &str,
    ) -> ReservationResult<ReservationId>;

    /// One live reservation joined with train and seat data.
    async fn get_reservation(&self, id: ReservationId) -> ReservationResult<ReservationDetail>;

    /// Every live reservation of a rider; `Empty` when there are none.
    async fn reservations_for_rider(
        &self,
        rider_id: RiderId,
    ) -> ReservationResult<Vec<ReservationDetail>>;

    /// Cancel a live reservation.
    async fn cancel(&self, id: ReservationId) -> ReservationResult<()>;
}

/// Collaborators the orchestrator validates against.
#[derive(Clone)]
pub struct Collaborators {
    /// User directory
    pub riders: Arc<dyn RiderLookup>,
    /// Train inventory
    pub trains: Arc<dyn TrainLookup>,
    /// Seat store
    pub seats: Arc<dyn SeatLookup>,
}

/// Event-driven orchestrator.
#[derive(Clone)]
pub struct ReservationService {
    store: ReservationStore,
    collaborators: Collaborators,
}

impl ReservationService {
    /// Orchestrator publishing to `event_bus` with the default retry policy.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        event_bus: Arc<dyn EventBus>,
        collaborators: Collaborators,
    ) -> Self {
        Self::with_retry_policy(clock, event_bus, collaborators, RetryPolicy::default())
    }

    /// Orchestrator with a custom publish retry policy.
    #[must_use]
    pub fn with_retry_policy(
        clock: Arc<dyn Clock>,
        event_bus: Arc<dyn EventBus>,
        collaborators: Collaborators,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store: Store::with_retry_policy(
                ReservationState::new(),
                ReservationReducer::new(),
                ReservationEnvironment::new(clock, event_bus),
                retry_policy,
            ),
            collaborators,
        }
    }

    /// Write a row; with `announce`, wait for `reservation.requested` to be
    /// accepted by the bus.
    pub(crate) async fn record(
        &self,
        rider_id: RiderId,
        seat: &Seat,
        status: ReservationStatus,
        announce: bool,
    ) -> ReservationResult<ReservationId> {
        let action = ReservationAction::Record {
            rider_id,
            train_id: seat.train_id,
            seat_id: seat.id,
            seat_number: seat.seat_number.clone(),
            status,
            announce,
        };
        let (outcome, mut handle) = self
            .store
            .send_and_inspect(action, |s| s.last_outcome.clone())
            .await;
        let reservation = outcome.ok_or_else(no_outcome)??;

        handle.wait().await;
        self.check_published(reservation.id, EventKind::Requested).await?;

        counter!("railseat_reservations_created_total", "status" => status.to_string())
            .increment(1);
        Ok(reservation.id)
    }

    /// Cancel a live row; with `announce`, wait for `reservation.cancelled`.
    pub(crate) async fn cancel_row(
        &self,
        id: ReservationId,
        announce: bool,
    ) -> ReservationResult<()> {
        let (outcome, mut handle) = self
            .store
            .send_and_inspect(ReservationAction::Cancel { id, announce }, |s| {
                s.last_outcome.clone()
            })
            .await;
        outcome.ok_or_else(no_outcome)??;

        handle.wait().await;
        self.check_published(id, EventKind::Cancelled).await?;

        counter!("railseat_reservations_cancelled_total").increment(1);
        Ok(())
    }

    /// A live row.
    pub(crate) async fn live_row(&self, id: ReservationId) -> ReservationResult<Reservation> {
        self.store
            .state(|s| s.live(id).cloned())
            .await
            .ok_or(ReservationError::NotFound(Entity::Reservation))
    }

    async fn check_published(&self, id: ReservationId, kind: EventKind) -> ReservationResult<()> {
        let failure = self.store.state(|s| s.publish_failure(id, kind)).await;
        match failure {
            Some(error) => {
                counter!("railseat_publish_failures_total", "topic" => kind.topic()).increment(1);
                Err(ReservationError::Unavailable(format!(
                    "{} not published: {error}",
                    kind.topic()
                )))
            },
            None => Ok(()),
        }
    }

    /// Join a row with display data from the train and seat services.
    async fn detail(&self, row: Reservation) -> ReservationResult<ReservationDetail> {
        let train = self.collaborators.trains.train(row.train_id).await?;

        let seat_number = self
            .collaborators
            .seats
            .seats_for_train(row.train_id)
            .await?
            .into_iter()
            .find(|seat| seat.id == row.seat_id)
            .map(|seat| seat.seat_number)
            .ok_or(ReservationError::NotFound(Entity::Seat))?;

        Ok(ReservationDetail {
            reservation_id: row.id,
            train_name: train.name,
            price: train.price,
            departure_station: train.departure_station,
            arrival_station: train.arrival_station,
            seat_number,
            reserved_at: row.reserved_at,
            status: row.status,
        })
    }
}

fn no_outcome() -> ReservationError {
    ReservationError::Unavailable("reservation store gave no outcome".into())
}

#[async_trait]
impl ReservationDesk for ReservationService {
    #[tracing::instrument(skip(self), fields(rider_id = %rider_id, train_id = %train_id))]
    async fn reserve(
        &self,
        rider_id: RiderId,
        train_id: TrainId,
        seat_number: &str,
    ) -> ReservationResult<ReservationId> {
        self.collaborators.riders.rider(rider_id).await?;
        self.collaborators.trains.train(train_id).await?;

        let seat = self
            .collaborators
            .seats
            .seats_for_train(train_id)
            .await?
            .into_iter()
            .find(|seat| seat.seat_number == seat_number)
            .ok_or(ReservationError::NotFound(Entity::Seat))?;
        if seat.reserved {
            return Err(ReservationError::Conflict(ConflictKind::SeatAlreadyReserved));
        }

        self.record(rider_id, &seat, ReservationStatus::Pending, true)
            .await
    }

    async fn get_reservation(&self, id: ReservationId) -> ReservationResult<ReservationDetail> {
        let row = self.live_row(id).await?;
        self.detail(row).await
    }

    async fn reservations_for_rider(
        &self,
        rider_id: RiderId,
    ) -> ReservationResult<Vec<ReservationDetail>> {
        let rows = self.store.state(|s| s.live_for_rider(rider_id)).await;
        if rows.is_empty() {
            return Err(ReservationError::Empty(rider_id));
        }
        try_join_all(rows.into_iter().map(|row| self.detail(row))).await
    }

    #[tracing::instrument(skip(self), fields(reservation_id = %id))]
    async fn cancel(&self, id: ReservationId) -> ReservationResult<()> {
        self.cancel_row(id, true).await
    }
}
