//! Application state for the HTTP server.
//!
//! Every service is a cheap `Clone` over its own `Store`, so the state is
//! cloned per request without copying any data.

use crate::app::{ReservationDesk, SeatService, TrainService, UserDirectory};
use railseat_runtime::metrics::MetricsServer;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Reservation orchestrator (either topology)
    pub reservations: Arc<dyn ReservationDesk>,

    /// Seat store
    pub seats: SeatService,

    /// Train inventory
    pub trains: TrainService,

    /// User directory
    pub users: UserDirectory,

    /// Prometheus recorder; `None` when metrics are disabled
    pub metrics: Option<Arc<MetricsServer>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        reservations: Arc<dyn ReservationDesk>,
        seats: SeatService,
        trains: TrainService,
        users: UserDirectory,
    ) -> Self {
        Self {
            reservations,
            seats,
            trains,
            users,
            metrics: None,
        }
    }

    /// Serve `/metrics` from `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsServer>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
