//! Train inventory service.

use super::collaborators::TrainLookup;
use crate::aggregates::{Adjustment, TrainAction, TrainEnvironment, TrainReducer, TrainState};
use crate::error::{Entity, ReservationError, ReservationResult};
use crate::types::{TrainId, TrainRun};
use async_trait::async_trait;
use railseat_runtime::Store;
use railseat_runtime::metrics::counter;

type TrainStore = Store<TrainState, TrainAction, TrainEnvironment, TrainReducer>;

/// Owns every train run's available-seat counter.
#[derive(Clone)]
pub struct TrainService {
    store: TrainStore,
}

impl Default for TrainService {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainService {
    /// Empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Store::new(TrainState::new(), TrainReducer::new(), TrainEnvironment),
        }
    }

    async fn dispatch(&self, action: TrainAction) -> ReservationResult<TrainRun> {
        let (outcome, _handle) = self
            .store
            .send_and_inspect(action, TrainState::last_adjustment)
            .await;
        let (result, clamped) = outcome
            .ok_or_else(|| ReservationError::Unavailable("train store gave no outcome".into()))?;

        if let Some(clamp) = clamped {
            counter!("railseat_train_counter_clamped_total", "direction" => clamp.as_str())
                .increment(1);
        }
        result
    }

    /// Add a train run.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a duplicate id or an inconsistent run.
    pub async fn register(&self, train: TrainRun) -> ReservationResult<TrainRun> {
        self.dispatch(TrainAction::RegisterTrain { train }).await
    }

    /// One train run.
    ///
    /// # Errors
    ///
    /// `NotFound(train)`.
    pub async fn get(&self, id: TrainId) -> ReservationResult<TrainRun> {
        self.store
            .state(|s| s.trains.get(&id).cloned())
            .await
            .ok_or(ReservationError::NotFound(Entity::Train))
    }

    /// Every train run in id order.
    pub async fn list_all(&self) -> Vec<TrainRun> {
        self.store.state(|s| s.trains.values().cloned().collect()).await
    }

    /// Administrative absolute set.
    ///
    /// # Errors
    ///
    /// `NotFound(train)`, or `InvalidInput` when `available_seats` exceeds
    /// capacity.
    pub async fn update_available_seats(
        &self,
        train_id: TrainId,
        available_seats: u32,
    ) -> ReservationResult<TrainRun> {
        self.dispatch(TrainAction::SetAvailableSeats {
            train_id,
            available_seats,
        })
        .await
    }

    /// Take one seat, clamped at zero.
    ///
    /// # Errors
    ///
    /// `NotFound(train)`.
    pub async fn decrement_available_seats(&self, train_id: TrainId) -> ReservationResult<TrainRun> {
        self.dispatch(TrainAction::AdjustAvailableSeats {
            train_id,
            adjustment: Adjustment::Decrement,
        })
        .await
    }

    /// Give one seat back, clamped at capacity.
    ///
    /// # Errors
    ///
    /// `NotFound(train)`.
    pub async fn increment_available_seats(&self, train_id: TrainId) -> ReservationResult<TrainRun> {
        self.dispatch(TrainAction::AdjustAvailableSeats {
            train_id,
            adjustment: Adjustment::Increment,
        })
        .await
    }
}

#[async_trait]
impl TrainLookup for TrainService {
    async fn train(&self, id: TrainId) -> ReservationResult<TrainRun> {
        self.get(id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn run(id: u64, total: u32) -> TrainRun {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        TrainRun {
            id: TrainId::new(id),
            name: format!("ITX {id}"),
            price: 23_700,
            departure_station: "Seoul".to_string(),
            arrival_station: "Chuncheon".to_string(),
            departure_time: day.and_hms_opt(9, 0, 0).unwrap(),
            arrival_time: day.and_hms_opt(10, 10, 0).unwrap(),
            total_seats: total,
            available_seats: total,
        }
    }

    #[tokio::test]
    async fn concurrent_decrements_are_not_lost() {
        let trains = TrainService::new();
        trains.register(run(100, 50)).await.unwrap();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let trains = trains.clone();
                tokio::spawn(async move { trains.decrement_available_seats(TrainId::new(100)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(trains.get(TrainId::new(100)).await.unwrap().available_seats, 30);
    }

    #[tokio::test]
    async fn clamped_adjustment_still_succeeds() {
        let trains = TrainService::new();
        trains.register(run(100, 1)).await.unwrap();

        let train = trains.increment_available_seats(TrainId::new(100)).await.unwrap();
        assert_eq!(train.available_seats, 1);
    }

    #[tokio::test]
    async fn update_rejects_overflow() {
        let trains = TrainService::new();
        trains.register(run(100, 2)).await.unwrap();

        assert!(matches!(
            trains.update_available_seats(TrainId::new(100), 3).await,
            Err(ReservationError::InvalidInput(_))
        ));
        assert_eq!(
            trains.update_available_seats(TrainId::new(7), 0).await,
            Err(ReservationError::NotFound(Entity::Train))
        );
    }
}
