//! Service layer: one type per service, each wrapping its own `Store`.

pub mod collaborators;
pub mod password;
pub mod reservations;
pub mod seats;
pub mod single_process;
pub mod trains;
pub mod users;

pub use collaborators::{RiderLookup, SeatLookup, TrainLookup};
pub use password::{PasswordHasher, Sha256Hasher};
pub use reservations::{Collaborators, ReservationDesk, ReservationService};
pub use seats::SeatService;
pub use single_process::SingleProcessDesk;
pub use trains::TrainService;
pub use users::{SignUp, UserDirectory};
