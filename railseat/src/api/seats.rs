//! Seat store endpoints.

use crate::server::state::AppState;
use crate::types::{Seat, SeatId, SeatRef, TrainId};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use railseat_web::AppError;
use serde::Deserialize;

/// `?trainId=` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainQuery {
    /// Train run
    pub train_id: TrainId,
}

/// Seats of one train.
///
/// # Errors
///
/// 400 `SEAT_NOT_FOUND` when the train has no seats.
pub async fn list_seats(
    State(state): State<AppState>,
    Query(query): Query<TrainQuery>,
) -> Result<Json<Vec<Seat>>, AppError> {
    Ok(Json(state.seats.list_by_train(query.train_id).await?))
}

/// Set the reserved flag.
///
/// # Errors
///
/// 400 `SEAT_NOT_FOUND` or `SEAT_ALREADY_RESERVED`.
pub async fn reserve_seat(
    State(state): State<AppState>,
    Path(id): Path<SeatId>,
) -> Result<Json<Seat>, AppError> {
    Ok(Json(state.seats.reserve(SeatRef::Id(id)).await?))
}

/// Clear the reserved flag.
///
/// # Errors
///
/// 400 `SEAT_NOT_FOUND` or `SEAT_NOT_RESERVED`.
pub async fn cancel_seat(
    State(state): State<AppState>,
    Path(id): Path<SeatId>,
) -> Result<Json<Seat>, AppError> {
    Ok(Json(state.seats.cancel(SeatRef::Id(id)).await?))
}
