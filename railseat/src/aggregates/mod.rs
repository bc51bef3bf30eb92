//! Reducers for the four services.
//!
//! Each service owns its rows exclusively; nothing here reaches into another
//! aggregate's state.

pub mod reservation;
pub mod rider;
pub mod seat;
pub mod train;

pub use reservation::{
    ReservationAction, ReservationEnvironment, ReservationReducer, ReservationState, Rollback,
};
pub use rider::{RiderAction, RiderEnvironment, RiderReducer, RiderState};
pub use seat::{SeatAction, SeatEnvironment, SeatReducer, SeatState};
pub use train::{Adjustment, TrainAction, TrainEnvironment, TrainReducer, TrainState};
