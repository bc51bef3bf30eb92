//! Domain types shared by the seat store, train inventory, user directory and
//! reservation orchestrator.
//!
//! Each service owns its own rows. Rows that mention another service's row
//! carry a copied identifier, never a reference to the row itself.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[doc = concat!("Wrap a raw `", stringify!($name), "` value")]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// The raw value
            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a train run
    TrainId
);
numeric_id!(
    /// Identifier of a seat row in the seat store
    SeatId
);
numeric_id!(
    /// Identifier of a rider in the user directory
    RiderId
);
numeric_id!(
    /// Identifier of a reservation record
    ReservationId
);

// ============================================================================
// Seat Store rows
// ============================================================================

/// One seat on one train run. Owned by the seat store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    /// Seat identity
    pub id: SeatId,
    /// Train run the seat belongs to
    pub train_id: TrainId,
    /// Human-facing seat number, unique within a train (e.g. "1A")
    pub seat_number: String,
    /// The seat flag
    pub reserved: bool,
    /// When the flag was last set, if ever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_at: Option<DateTime<Utc>>,
}

impl Seat {
    /// A free seat.
    #[must_use]
    pub fn new(id: SeatId, train_id: TrainId, seat_number: impl Into<String>) -> Self {
        Self {
            id,
            train_id,
            seat_number: seat_number.into(),
            reserved: false,
            reserved_at: None,
        }
    }
}

/// How a caller names a seat.
///
/// The HTTP surface uses the row id. Event consumers only know the train and
/// seat number carried by the event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatRef {
    /// By seat store row id
    Id(SeatId),
    /// By position on a train
    Position {
        /// Train run
        train_id: TrainId,
        /// Seat number on that train
        seat_number: String,
    },
}

impl SeatRef {
    /// Reference a seat by train and seat number.
    #[must_use]
    pub fn position(train_id: TrainId, seat_number: impl Into<String>) -> Self {
        Self::Position {
            train_id,
            seat_number: seat_number.into(),
        }
    }
}

impl fmt::Display for SeatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "seat #{id}"),
            Self::Position {
                train_id,
                seat_number,
            } => write!(f, "seat {seat_number} on train {train_id}"),
        }
    }
}

// ============================================================================
// Train Inventory rows
// ============================================================================

/// A scheduled train run with its available-seat counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRun {
    /// Train identity
    pub id: TrainId,
    /// Display name (e.g. "KTX 101")
    pub name: String,
    /// Fare in the smallest currency unit
    pub price: u32,
    /// Origin station
    pub departure_station: String,
    /// Destination station
    pub arrival_station: String,
    /// Local departure time
    pub departure_time: NaiveDateTime,
    /// Local arrival time
    pub arrival_time: NaiveDateTime,
    /// Capacity of the run
    pub total_seats: u32,
    /// Seats not held by a live reservation. `0 ≤ available_seats ≤ total_seats`.
    pub available_seats: u32,
}

/// Which bound a counter adjustment ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clamp {
    /// Decrement at zero
    Floor,
    /// Increment at capacity
    Ceiling,
}

impl Clamp {
    /// Label value used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Ceiling => "ceiling",
        }
    }
}

// ============================================================================
// User Directory rows
// ============================================================================

/// Public view of a rider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderProfile {
    /// Rider identity
    pub id: RiderId,
    /// Login name, unique
    pub username: String,
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
}

/// A rider as stored by the user directory, password hash included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiderAccount {
    /// Public part
    pub profile: RiderProfile,
    /// Output of the directory's password hasher
    pub password_hash: String,
}

// ============================================================================
// Reservation rows
// ============================================================================

/// Lifecycle of a reservation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Written; seat and train updates are still in flight
    Pending,
    /// Written together with the seat and train updates
    Confirmed,
    /// Cancelled; behaves as deleted
    Cancelled,
}

impl ReservationStatus {
    /// Whether the reservation still holds its seat.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// A reservation record. Owned by the orchestrator.
///
/// `seat_number` is copied from the seat store at write time; it is not a
/// foreign key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Reservation identity
    pub id: ReservationId,
    /// Owning rider
    pub rider_id: RiderId,
    /// Train run
    pub train_id: TrainId,
    /// Seat row id in the seat store at write time
    pub seat_id: SeatId,
    /// Seat number at write time
    pub seat_number: String,
    /// When the reservation was written
    pub reserved_at: DateTime<Utc>,
    /// Lifecycle status
    pub status: ReservationStatus,
}

/// A reservation joined with train and seat display data at read time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDetail {
    /// Reservation identity
    pub reservation_id: ReservationId,
    /// Train name
    pub train_name: String,
    /// Fare
    pub price: u32,
    /// Origin station
    pub departure_station: String,
    /// Destination station
    pub arrival_station: String,
    /// Seat number
    pub seat_number: String,
    /// When the reservation was written
    pub reserved_at: DateTime<Utc>,
    /// Lifecycle status
    pub status: ReservationStatus,
}
