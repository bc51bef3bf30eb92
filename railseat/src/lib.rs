//! Railseat: train seat reservations across independently owned services.
//!
//! Four services each own their data:
//!
//! - **User directory**: riders, sign-up and login
//! - **Train inventory**: runs and their available-seat counter
//! - **Seat store**: one reserved flag per seat
//! - **Reservation orchestrator**: reservation rows
//!
//! The orchestrator validates a request against the other three
//! synchronously, writes its row, and announces it on the message channel.
//! The seat store and the train inventory update themselves from their own
//! durable queues.
//!
//! # Architecture
//!
//! ```text
//!   HTTP /api/v1
//!        │
//!        ▼
//! ┌──────────────┐  lookups   ┌──────────┐ ┌──────────┐ ┌──────────┐
//! │ Reservation  │ ─────────▶ │  Users   │ │  Trains  │ │  Seats   │
//! │ orchestrator │            └──────────┘ └────▲─────┘ └────▲─────┘
//! └──────┬───────┘                              │            │
//!        │ reservation.requested                │            │
//!        │ reservation.cancelled                │            │
//!        ▼                                      │            │
//! ┌─────────────────────────────────────────────┴────────────┴──────┐
//! │ event bus: seat-service.reservations, train-service.reservations│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Seat and train state therefore lag behind the reservation row. Nothing
//! reconciles them if a consumer drops an event; [`runtime::FailurePolicy`]
//! decides per service and topic whether a failed mutation is dropped or
//! reported.
//!
//! A single-process topology ([`app::SingleProcessDesk`]) changes all three
//! in one unit of work instead, with no events.

pub mod aggregates;
pub mod api;
pub mod app;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod runtime;
pub mod seed;
pub mod server;
pub mod types;

pub use bootstrap::{ApplicationBuilder, BootstrapError, ResourceManager, assemble};
pub use config::Config;
pub use error::{ReservationError, ReservationResult};
