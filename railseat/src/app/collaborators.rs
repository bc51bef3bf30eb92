//! Synchronous lookups the orchestrator makes before it writes anything.
//!
//! Each trait has two implementations: the in-process service (the default
//! wiring) and an HTTP client in [`crate::clients`] for when the service runs
//! elsewhere. Calls fail fast: no retry and no timeout beyond the
//! transport's own.

use crate::error::ReservationResult;
use crate::types::{RiderId, RiderProfile, Seat, TrainId, TrainRun};
use async_trait::async_trait;

/// User directory existence check.
#[async_trait]
pub trait RiderLookup: Send + Sync {
    /// Fetch a rider, `NotFound(rider)` when absent.
    async fn rider(&self, id: RiderId) -> ReservationResult<RiderProfile>;
}

/// Train inventory read.
#[async_trait]
pub trait TrainLookup: Send + Sync {
    /// Fetch a train run, `NotFound(train)` when absent.
    async fn train(&self, id: TrainId) -> ReservationResult<TrainRun>;
}

/// Seat store read.
#[async_trait]
pub trait SeatLookup: Send + Sync {
    /// Seats of a train, `NotFound(seat)` when the train has none.
    async fn seats_for_train(&self, train_id: TrainId) -> ReservationResult<Vec<Seat>>;
}
