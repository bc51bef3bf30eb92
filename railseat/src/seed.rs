//! Initial trains, seats and riders.
//!
//! A seed file is plain JSON:
//!
//! ```json
//! {
//!   "trains": [{"id": 100, "name": "KTX 101", "price": 59800, ...}],
//!   "seats":  [{"id": 1, "trainId": 100, "seatNumber": "1A"}],
//!   "riders": [{"id": 1, "username": "jiwoo", "name": "...", "email": "...", "password": "..."}]
//! }
//! ```
//!
//! Rows keep the ids given in the file, so reservations and events refer to
//! the same numbers across restarts.

use crate::app::{SeatService, SignUp, TrainService, UserDirectory};
use crate::error::ReservationError;
use crate::types::{RiderId, SeatId, TrainId, TrainRun};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEMO: &str = include_str!("../seed/demo.json");

/// Errors while loading or applying a seed.
#[derive(Error, Debug)]
pub enum SeedError {
    /// The file could not be read
    #[error("failed to read seed file {path}: {source}")]
    Read {
        /// Seed file
        path: PathBuf,
        /// I/O failure
        source: std::io::Error,
    },

    /// The JSON does not match the seed shape
    #[error("invalid seed data: {0}")]
    Parse(#[from] serde_json::Error),

    /// A row was refused by its service
    #[error("failed to seed {row}: {source}")]
    Rejected {
        /// Which row
        row: String,
        /// Why
        source: ReservationError,
    },
}

/// One seat row.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSeat {
    /// Row id
    pub id: SeatId,
    /// Train run
    pub train_id: TrainId,
    /// Seat number on that run
    pub seat_number: String,
}

/// One rider account.
#[derive(Clone, Debug, Deserialize)]
pub struct SeedRider {
    /// Rider id
    pub id: RiderId,
    /// Login name
    pub username: String,
    /// Display name
    pub name: String,
    /// Contact address
    pub email: String,
    /// Plaintext password, hashed on load
    pub password: String,
}

/// Contents of a seed file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SeedData {
    /// Train runs
    #[serde(default)]
    pub trains: Vec<TrainRun>,
    /// Seats
    #[serde(default)]
    pub seats: Vec<SeedSeat>,
    /// Rider accounts
    #[serde(default)]
    pub riders: Vec<SeedRider>,
}

/// Row counts written by [`SeedData::apply`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Trains registered
    pub trains: usize,
    /// Seats registered
    pub seats: usize,
    /// Riders signed up
    pub riders: usize,
}

impl SeedData {
    /// Parse seed JSON.
    ///
    /// # Errors
    ///
    /// [`SeedError::Parse`] when the document does not match.
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a seed file.
    ///
    /// # Errors
    ///
    /// [`SeedError::Read`] or [`SeedError::Parse`].
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let json = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The bundled two-train demo data set.
    ///
    /// # Errors
    ///
    /// [`SeedError::Parse`] if the bundled file is malformed.
    pub fn demo() -> Result<Self, SeedError> {
        Self::from_json(DEMO)
    }

    /// Register every row with its owning service.
    ///
    /// Trains go first so seats can refer to them.
    ///
    /// # Errors
    ///
    /// [`SeedError::Rejected`] for the first row a service refuses.
    pub async fn apply(
        self,
        trains: &TrainService,
        seats: &SeatService,
        users: &UserDirectory,
    ) -> Result<SeedSummary, SeedError> {
        let mut summary = SeedSummary::default();

        for train in self.trains {
            let row = format!("train {}", train.id);
            trains
                .register(train)
                .await
                .map_err(|source| SeedError::Rejected { row, source })?;
            summary.trains += 1;
        }

        for seat in self.seats {
            let row = format!("seat {}", seat.id);
            seats
                .register(seat.id, seat.train_id, seat.seat_number)
                .await
                .map_err(|source| SeedError::Rejected { row, source })?;
            summary.seats += 1;
        }

        for rider in self.riders {
            let row = format!("rider {}", rider.username);
            users
                .sign_up(SignUp {
                    id: Some(rider.id),
                    username: rider.username,
                    name: rider.name,
                    email: rider.email,
                    password: rider.password,
                })
                .await
                .map_err(|source| SeedError::Rejected { row, source })?;
            summary.riders += 1;
        }

        tracing::info!(
            trains = summary.trains,
            seats = summary.seats,
            riders = summary.riders,
            "Seed data loaded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::app::Sha256Hasher;
    use crate::types::SeatRef;
    use railseat_testing::test_clock;
    use std::sync::Arc;

    #[tokio::test]
    async fn demo_data_registers_every_row() {
        let trains = TrainService::new();
        let seats = SeatService::new(Arc::new(test_clock()));
        let users = UserDirectory::new(Arc::new(Sha256Hasher));

        let summary = SeedData::demo()
            .unwrap()
            .apply(&trains, &seats, &users)
            .await
            .unwrap();

        assert_eq!(
            summary,
            SeedSummary {
                trains: 2,
                seats: 6,
                riders: 2
            }
        );
        let seat = seats
            .get(&SeatRef::position(TrainId::new(100), "1A"))
            .await
            .unwrap();
        assert!(!seat.reserved);
        assert_eq!(users.login("jiwoo", "railseat").await.unwrap(), RiderId::new(1));
    }

    #[tokio::test]
    async fn duplicate_seat_is_rejected_with_its_row() {
        let data = SeedData::from_json(
            r#"{"seats": [
                {"id": 1, "trainId": 100, "seatNumber": "A1"},
                {"id": 1, "trainId": 100, "seatNumber": "A2"}
            ]}"#,
        )
        .unwrap();

        let error = data
            .apply(
                &TrainService::new(),
                &SeatService::new(Arc::new(test_clock())),
                &UserDirectory::new(Arc::new(Sha256Hasher)),
            )
            .await
            .unwrap_err();

        assert!(matches!(error, SeedError::Rejected { ref row, .. } if row == "seat 1"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            SeedData::from_json("{\"trains\": 3}"),
            Err(SeedError::Parse(_))
        ));
    }
}
