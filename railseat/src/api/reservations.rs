//! Reservation orchestrator endpoints.
//!
//! - POST /api/v1/reservations?userId= - Reserve a seat
//! - GET /api/v1/reservations/:id - One live reservation
//! - GET /api/v1/reservations?userId= - A rider's live reservations
//! - DELETE /api/v1/reservations/:id - Cancel
//!
//! In the event-driven topology a 201 means the row was written and
//! `reservation.requested` was accepted by the bus. The seat flag and the
//! train counter move afterwards, so a reservation can be returned here
//! while its seat is still free.

use crate::server::state::AppState;
use crate::types::{ReservationDetail, ReservationId, RiderId, TrainId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use railseat_web::AppError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// `?userId=` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderQuery {
    /// Acting rider
    pub user_id: RiderId,
}

/// Body of a reserve request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    /// Train run
    pub train_id: TrainId,
    /// Seat on that run
    pub seat_number: String,
}

/// Reserve and cancel response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationAck {
    /// Affected reservation
    pub reservation_id: ReservationId,
    /// Message for the user
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Reserve a seat.
///
/// ```bash
/// curl -X POST 'http://localhost:8080/api/v1/reservations?userId=1' \
///   -H "Content-Type: application/json" \
///   -d '{"trainId": 100, "seatNumber": "A1"}'
/// # {"reservationId":1,"message":"Reservation accepted"}
/// ```
///
/// # Errors
///
/// 400 `RIDER_NOT_FOUND`, `TRAIN_NOT_FOUND`, `SEAT_NOT_FOUND`,
/// `SEAT_ALREADY_RESERVED` or `INVALID_INPUT`; 503 when a collaborator or
/// the bus is unreachable.
pub async fn create_reservation(
    State(state): State<AppState>,
    Query(rider): Query<RiderQuery>,
    Json(request): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ReservationAck>), AppError> {
    if request.seat_number.trim().is_empty() {
        return Err(AppError::client("INVALID_INPUT", "seatNumber must not be blank"));
    }

    let reservation_id = state
        .reservations
        .reserve(rider.user_id, request.train_id, &request.seat_number)
        .await?;

    tracing::info!(
        reservation_id = %reservation_id,
        rider_id = %rider.user_id,
        train_id = %request.train_id,
        seat_number = %request.seat_number,
        "Reservation accepted"
    );

    Ok((
        StatusCode::CREATED,
        Json(ReservationAck {
            reservation_id,
            message: "Reservation accepted".to_string(),
        }),
    ))
}

/// One live reservation joined with train and seat data.
///
/// # Errors
///
/// 400 `RESERVATION_NOT_FOUND` for unknown or cancelled ids.
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationDetail>, AppError> {
    Ok(Json(state.reservations.get_reservation(id).await?))
}

/// Every live reservation of a rider.
///
/// # Errors
///
/// 400 `NO_RESERVATIONS` when the rider has none.
pub async fn list_rider_reservations(
    State(state): State<AppState>,
    Query(rider): Query<RiderQuery>,
) -> Result<Json<Vec<ReservationDetail>>, AppError> {
    Ok(Json(
        state
            .reservations
            .reservations_for_rider(rider.user_id)
            .await?,
    ))
}

/// Cancel a live reservation.
///
/// # Errors
///
/// 400 `RESERVATION_NOT_FOUND`; in the single-process topology also
/// `SEAT_NOT_RESERVED`.
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationAck>, AppError> {
    state.reservations.cancel(id).await?;

    tracing::info!(reservation_id = %id, "Reservation cancelled");

    Ok(Json(ReservationAck {
        reservation_id: id,
        message: "Reservation cancelled".to_string(),
    }))
}
