//! Single-process topology.
//!
//! Seat, train and reservation live in one process and change in one unit
//! of work: either the seat is taken, the counter decremented and a
//! `CONFIRMED` row written, or nothing changes. No events are published.
//! Units of work are serialized by one mutex, which stands in for the
//! enclosing database transaction.

use super::collaborators::RiderLookup;
use super::reservations::{ReservationDesk, ReservationService};
use super::seats::SeatService;
use super::trains::TrainService;
use crate::error::ReservationResult;
use crate::types::{ReservationDetail, ReservationId, ReservationStatus, RiderId, SeatRef, TrainId};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Orchestrator that mutates seat and train state directly.
pub struct SingleProcessDesk {
    ledger: ReservationService,
    riders: Arc<dyn RiderLookup>,
    seats: SeatService,
    trains: TrainService,
    unit_of_work: Mutex<()>,
}

impl SingleProcessDesk {
    /// `ledger` holds the reservation rows and answers reads; it is never
    /// asked to publish.
    #[must_use]
    pub fn new(
        ledger: ReservationService,
        riders: Arc<dyn RiderLookup>,
        seats: SeatService,
        trains: TrainService,
    ) -> Self {
        Self {
            ledger,
            riders,
            seats,
            trains,
            unit_of_work: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ReservationDesk for SingleProcessDesk {
    #[tracing::instrument(skip(self), fields(rider_id = %rider_id, train_id = %train_id))]
    async fn reserve(
        &self,
        rider_id: RiderId,
        train_id: TrainId,
        seat_number: &str,
    ) -> ReservationResult<ReservationId> {
        let _unit = self.unit_of_work.lock().await;

        self.riders.rider(rider_id).await?;
        self.trains.get(train_id).await?;
        let seat = self
            .seats
            .reserve(SeatRef::position(train_id, seat_number))
            .await?;

        if let Err(error) = self.trains.decrement_available_seats(train_id).await {
            self.undo_seat(SeatRef::Id(seat.id)).await;
            return Err(error);
        }

        match self
            .ledger
            .record(rider_id, &seat, ReservationStatus::Confirmed, false)
            .await
        {
            Ok(id) => Ok(id),
            Err(error) => {
                self.undo_seat(SeatRef::Id(seat.id)).await;
                if let Err(undo) = self.trains.increment_available_seats(train_id).await {
                    tracing::error!(error = %undo, "Could not restore available seats");
                }
                Err(error)
            },
        }
    }

    async fn get_reservation(&self, id: ReservationId) -> ReservationResult<ReservationDetail> {
        self.ledger.get_reservation(id).await
    }

    async fn reservations_for_rider(
        &self,
        rider_id: RiderId,
    ) -> ReservationResult<Vec<ReservationDetail>> {
        self.ledger.reservations_for_rider(rider_id).await
    }

    #[tracing::instrument(skip(self), fields(reservation_id = %id))]
    async fn cancel(&self, id: ReservationId) -> ReservationResult<()> {
        let _unit = self.unit_of_work.lock().await;

        let row = self.ledger.live_row(id).await?;
        self.seats.cancel(SeatRef::Id(row.seat_id)).await?;

        if let Err(error) = self.trains.increment_available_seats(row.train_id).await {
            self.redo_seat(SeatRef::Id(row.seat_id)).await;
            return Err(error);
        }

        if let Err(error) = self.ledger.cancel_row(id, false).await {
            self.redo_seat(SeatRef::Id(row.seat_id)).await;
            if let Err(undo) = self.trains.decrement_available_seats(row.train_id).await {
                tracing::error!(error = %undo, "Could not restore available seats");
            }
            return Err(error);
        }
        Ok(())
    }
}

impl SingleProcessDesk {
    async fn undo_seat(&self, seat: SeatRef) {
        if let Err(error) = self.seats.cancel(seat).await {
            tracing::error!(error = %error, "Could not release seat after failed reservation");
        }
    }

    async fn redo_seat(&self, seat: SeatRef) {
        if let Err(error) = self.seats.reserve(seat).await {
            tracing::error!(error = %error, "Could not retake seat after failed cancel");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::app::password::Sha256Hasher;
    use crate::app::reservations::Collaborators;
    use crate::app::users::{SignUp, UserDirectory};
    use crate::error::{ConflictKind, Entity, ReservationError};
    use crate::types::{SeatId, TrainRun};
    use chrono::NaiveDate;
    use railseat_core::environment::Clock;
    use railseat_testing::{RecordingEventBus, test_clock};

    struct Fixture {
        bus: Arc<RecordingEventBus>,
        seats: SeatService,
        trains: TrainService,
        desk: SingleProcessDesk,
    }

    async fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        let bus = Arc::new(RecordingEventBus::new());

        let users = Arc::new(UserDirectory::new(Arc::new(Sha256Hasher)));
        users
            .sign_up(SignUp {
                id: Some(RiderId::new(1)),
                username: "u1".to_string(),
                name: "U One".to_string(),
                email: "u1@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let trains = TrainService::new();
        trains
            .register(TrainRun {
                id: TrainId::new(100),
                name: "KTX 100".to_string(),
                price: 59_800,
                departure_station: "Seoul".to_string(),
                arrival_station: "Busan".to_string(),
                departure_time: day.and_hms_opt(8, 0, 0).unwrap(),
                arrival_time: day.and_hms_opt(10, 40, 0).unwrap(),
                total_seats: 2,
                available_seats: 2,
            })
            .await
            .unwrap();

        let seats = SeatService::new(Arc::clone(&clock));
        seats.register(SeatId::new(1), TrainId::new(100), "1A").await.unwrap();
        seats.register(SeatId::new(2), TrainId::new(100), "1B").await.unwrap();

        let ledger = ReservationService::new(
            clock,
            bus.clone(),
            Collaborators {
                riders: users.clone(),
                trains: Arc::new(trains.clone()),
                seats: Arc::new(seats.clone()),
            },
        );
        let desk = SingleProcessDesk::new(ledger, users, seats.clone(), trains.clone());

        Fixture {
            bus,
            seats,
            trains,
            desk,
        }
    }

    #[tokio::test]
    async fn reserve_is_one_synchronous_unit() {
        let f = fixture().await;

        let id = f
            .desk
            .reserve(RiderId::new(1), TrainId::new(100), "1A")
            .await
            .unwrap();

        let detail = f.desk.get_reservation(id).await.unwrap();
        assert_eq!(detail.status, ReservationStatus::Confirmed);
        assert!(f.seats.get(&SeatRef::Id(SeatId::new(1))).await.unwrap().reserved);
        assert_eq!(f.trains.get(TrainId::new(100)).await.unwrap().available_seats, 1);
        assert!(f.bus.published().is_empty());
    }

    #[tokio::test]
    async fn concurrent_reserves_of_one_seat_have_one_winner() {
        let f = fixture().await;

        let (a, b) = tokio::join!(
            f.desk.reserve(RiderId::new(1), TrainId::new(100), "1B"),
            f.desk.reserve(RiderId::new(1), TrainId::new(100), "1B"),
        );

        assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(f.trains.get(TrainId::new(100)).await.unwrap().available_seats, 1);
    }

    #[tokio::test]
    async fn cancel_restores_seat_and_counter() {
        let f = fixture().await;
        let id = f
            .desk
            .reserve(RiderId::new(1), TrainId::new(100), "1A")
            .await
            .unwrap();

        f.desk.cancel(id).await.unwrap();

        assert!(!f.seats.get(&SeatRef::Id(SeatId::new(1))).await.unwrap().reserved);
        assert_eq!(f.trains.get(TrainId::new(100)).await.unwrap().available_seats, 2);
        assert_eq!(
            f.desk.cancel(id).await,
            Err(ReservationError::NotFound(Entity::Reservation))
        );
    }

    #[tokio::test]
    async fn cancel_of_already_free_seat_conflicts() {
        let f = fixture().await;
        let id = f
            .desk
            .reserve(RiderId::new(1), TrainId::new(100), "1A")
            .await
            .unwrap();
        f.seats.cancel(SeatRef::Id(SeatId::new(1))).await.unwrap();

        assert_eq!(
            f.desk.cancel(id).await,
            Err(ReservationError::Conflict(ConflictKind::SeatNotReserved))
        );
        assert!(f.desk.get_reservation(id).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_train_changes_nothing() {
        let f = fixture().await;

        assert_eq!(
            f.desk.reserve(RiderId::new(1), TrainId::new(404), "1A").await,
            Err(ReservationError::NotFound(Entity::Train))
        );
        assert!(!f.seats.get(&SeatRef::Id(SeatId::new(1))).await.unwrap().reserved);
    }
}
