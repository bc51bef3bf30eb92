//! Error taxonomy of the reservation protocol.
//!
//! Every service reports failures with [`ReservationError`]. Over HTTP the
//! error travels as `{code, message}`; [`ReservationError::from_remote`]
//! rebuilds it on the calling side.

use crate::types::RiderId;
use railseat_web::AppError;
use std::fmt;
use thiserror::Error;

/// Row kinds that can be missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    /// User directory row
    Rider,
    /// Train inventory row
    Train,
    /// Seat store row
    Seat,
    /// Orchestrator row
    Reservation,
}

impl Entity {
    /// Lower-case name used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rider => "rider",
            Self::Train => "train",
            Self::Seat => "seat",
            Self::Reservation => "reservation",
        }
    }

    const fn not_found_code(self) -> &'static str {
        match self {
            Self::Rider => "RIDER_NOT_FOUND",
            Self::Train => "TRAIN_NOT_FOUND",
            Self::Seat => "SEAT_NOT_FOUND",
            Self::Reservation => "RESERVATION_NOT_FOUND",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State transitions that were refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Reserve on a seat whose flag is already set
    SeatAlreadyReserved,
    /// Cancel on a seat whose flag is already clear
    SeatNotReserved,
    /// Sign-up with a username that is taken
    DuplicateRider,
    /// Login with the wrong password
    WrongCredentials,
}

impl ConflictKind {
    const fn code(self) -> &'static str {
        match self {
            Self::SeatAlreadyReserved => "SEAT_ALREADY_RESERVED",
            Self::SeatNotReserved => "SEAT_NOT_RESERVED",
            Self::DuplicateRider => "DUPLICATE_RIDER",
            Self::WrongCredentials => "WRONG_CREDENTIALS",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::SeatAlreadyReserved => "seat is already reserved",
            Self::SeatNotReserved => "seat is not reserved",
            Self::DuplicateRider => "rider already exists",
            Self::WrongCredentials => "password does not match",
        };
        f.write_str(message)
    }
}

/// Errors surfaced by every service operation.
///
/// None of these are retried by the orchestrator. All but
/// [`Unavailable`](Self::Unavailable) are client errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// A rider, train, seat or reservation does not exist
    #[error("{0} not found")]
    NotFound(Entity),

    /// The requested transition is not allowed in the current state
    #[error("{0}")]
    Conflict(ConflictKind),

    /// The rider has no live reservations
    #[error("no reservations found for rider {0}")]
    Empty(RiderId),

    /// A request value is out of range or malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator or the event bus could not be reached
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ReservationError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(entity) => entity.not_found_code(),
            Self::Conflict(kind) => kind.code(),
            Self::Empty(_) => "NO_RESERVATIONS",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Unavailable(_) => "UNAVAILABLE",
        }
    }

    /// Rebuild an error from a remote service's `{code, message}` body.
    ///
    /// `rider` fills in the rider id for `NO_RESERVATIONS`, which the body
    /// only carries inside the message. Unknown codes become `Unavailable`.
    #[must_use]
    pub fn from_remote(code: &str, message: &str, rider: Option<RiderId>) -> Self {
        match code {
            "RIDER_NOT_FOUND" => Self::NotFound(Entity::Rider),
            "TRAIN_NOT_FOUND" => Self::NotFound(Entity::Train),
            "SEAT_NOT_FOUND" => Self::NotFound(Entity::Seat),
            "RESERVATION_NOT_FOUND" => Self::NotFound(Entity::Reservation),
            "SEAT_ALREADY_RESERVED" => Self::Conflict(ConflictKind::SeatAlreadyReserved),
            "SEAT_NOT_RESERVED" => Self::Conflict(ConflictKind::SeatNotReserved),
            "DUPLICATE_RIDER" => Self::Conflict(ConflictKind::DuplicateRider),
            "WRONG_CREDENTIALS" => Self::Conflict(ConflictKind::WrongCredentials),
            "NO_RESERVATIONS" => match rider {
                Some(rider) => Self::Empty(rider),
                None => Self::InvalidInput(message.to_string()),
            },
            "INVALID_INPUT" => Self::InvalidInput(message.to_string()),
            _ => Self::Unavailable(format!("[{code}] {message}")),
        }
    }

    /// Shorthand for `NotFound`.
    #[must_use]
    pub const fn not_found(entity: Entity) -> Self {
        Self::NotFound(entity)
    }

    /// Whether this is a `NotFound` for `entity`.
    #[must_use]
    pub fn is_not_found(&self, entity: Entity) -> bool {
        *self == Self::NotFound(entity)
    }
}

impl From<ReservationError> for AppError {
    fn from(error: ReservationError) -> Self {
        match &error {
            ReservationError::Unavailable(_) => {
                Self::unavailable(error.to_string()).with_source(anyhow::Error::new(error))
            },
            _ => Self::client(error.code(), error.to_string()),
        }
    }
}

/// Result alias for service operations.
pub type ReservationResult<T> = Result<T, ReservationError>;
