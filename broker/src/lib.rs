//! Event bus transports for Railseat.
//!
//! Both implement [`EventBus`](railseat_core::event_bus::EventBus) with the
//! same topic → durable queue model:
//!
//! - [`InMemoryBroker`]: per-queue FIFO inside the process. Used by tests and
//!   by the single-binary deployment.
//! - `KafkaEventBus` (feature `kafka`): one consumer group per queue, message
//!   key = `trainId:seatNumber`.
//!
//! # Delivery Semantics
//!
//! At-least-once. The in-memory broker never redelivers by itself, but
//! consumers are written against the weaker contract.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use memory::InMemoryBroker;

#[cfg(feature = "kafka")]
pub use kafka::KafkaEventBus;
