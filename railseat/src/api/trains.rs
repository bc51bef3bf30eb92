//! Train inventory endpoints.

use crate::server::state::AppState;
use crate::types::{TrainId, TrainRun};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use railseat_web::AppError;
use serde::Deserialize;

/// `?availableSeats=` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSeatsQuery {
    /// New counter value
    pub available_seats: u32,
}

/// Every train run.
pub async fn list_trains(State(state): State<AppState>) -> Json<Vec<TrainRun>> {
    Json(state.trains.list_all().await)
}

/// One train run.
///
/// # Errors
///
/// 400 `TRAIN_NOT_FOUND`.
pub async fn get_train(
    State(state): State<AppState>,
    Path(id): Path<TrainId>,
) -> Result<Json<TrainRun>, AppError> {
    Ok(Json(state.trains.get(id).await?))
}

/// Administrative absolute set of the available-seat counter.
///
/// # Errors
///
/// 400 `TRAIN_NOT_FOUND`, or `INVALID_INPUT` above capacity.
pub async fn update_available_seats(
    State(state): State<AppState>,
    Path(id): Path<TrainId>,
    Query(query): Query<AvailableSeatsQuery>,
) -> Result<Json<TrainRun>, AppError> {
    Ok(Json(
        state
            .trains
            .update_available_seats(id, query.available_seats)
            .await?,
    ))
}
