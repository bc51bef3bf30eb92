//! Axum glue shared by the Railseat services.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives; [`request_id_layer`] tags it
//! 2. **Extract** path, query and JSON body
//! 3. **Call** the owning service (which dispatches through its `Store`)
//! 4. **Map** the domain result to JSON, or the domain error to [`AppError`]
//!
//! # Example
//!
//! ```ignore
//! use railseat_web::{AppError, request_id_layer};
//! use axum::{Router, routing::get, Json};
//!
//! async fn get_train(
//!     State(state): State<AppState>,
//!     Path(id): Path<u64>,
//! ) -> Result<Json<TrainView>, AppError> {
//!     Ok(Json(state.trains.get(TrainId::new(id)).await?.into()))
//! }
//!
//! let app = Router::new()
//!     .route("/api/v1/trains/:id", get(get_train))
//!     .layer(request_id_layer())
//!     .with_state(app_state);
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod request_id;

pub use error::{AppError, ErrorBody};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
