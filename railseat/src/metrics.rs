//! Business metrics for the reservation protocol.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `railseat_reservations_created_total{status}` - Rows written, by initial status
//! - `railseat_reservations_cancelled_total` - Rows cancelled
//! - `railseat_publish_failures_total{topic}` - Events the bus refused after retries
//! - `railseat_train_counter_clamped_total{direction}` - Counter moves absorbed by a bound
//!
//! Consumer outcomes (`consumer_events_total`) and the store and event bus
//! series are described by the runtime crate.

use metrics::describe_counter;

/// Register descriptions for the business counters.
///
/// Call once at startup, before any of them is recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "railseat_reservations_created_total",
        "Reservation rows written, by initial status (pending, confirmed)"
    );
    describe_counter!(
        "railseat_reservations_cancelled_total",
        "Reservation rows marked cancelled"
    );
    describe_counter!(
        "railseat_publish_failures_total",
        "Reservation events the event bus did not accept, by topic"
    );
    describe_counter!(
        "railseat_train_counter_clamped_total",
        "Available-seat adjustments that hit zero or capacity, by direction"
    );

    tracing::info!("Business metrics registered");
}
