//! Event consumption and process lifecycle.
//!
//! - **`consumer`**: drains one durable queue through an [`EventHandler`]
//! - **`handlers`**: seat and train handlers, failure policies, redelivery log
//! - **`lifecycle`**: HTTP server plus consumers with graceful shutdown

pub mod consumer;
pub mod handlers;
pub mod lifecycle;

pub use consumer::{ConsumerProgress, EventConsumer, MissingPart};
pub use handlers::{
    EventHandler, FailurePolicy, HandlerError, ProcessedLog, SeatEventHandler, TopicPolicies,
    TrainEventHandler,
};
pub use lifecycle::Application;
