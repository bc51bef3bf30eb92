//! HTTP handlers, one module per service.
//!
//! - Reservations: the orchestrator's reserve, lookup and cancel
//! - Seats: per-train listing and the reserved flag
//! - Trains: runs and the available-seat counter
//! - Users: sign-up, login and profiles

pub mod reservations;
pub mod seats;
pub mod trains;
pub mod users;

pub use reservations::{
    cancel_reservation, create_reservation, get_reservation, list_rider_reservations,
};
pub use seats::{cancel_seat, list_seats, reserve_seat};
pub use trains::{get_train, list_trains, update_available_seats};
pub use users::{get_user, login, sign_up};
