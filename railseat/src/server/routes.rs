//! Router configuration.

use super::health::{health_check, metrics};
use super::state::AppState;
use crate::api::{reservations, seats, trains, users};
use axum::{
    Router,
    routing::{get, post, put},
};
use railseat_web::request_id_layer;

/// Build the complete router.
///
/// Every service's endpoints are mounted under `/api/v1`; `/health` and
/// `/metrics` sit at the root.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Reservation orchestrator
        .route(
            "/reservations",
            post(reservations::create_reservation).get(reservations::list_rider_reservations),
        )
        .route(
            "/reservations/:id",
            get(reservations::get_reservation).delete(reservations::cancel_reservation),
        )
        // Seat store
        .route("/seats", get(seats::list_seats))
        .route("/seats/:id/reserve", post(seats::reserve_seat))
        .route("/seats/:id/cancel", post(seats::cancel_seat))
        // Train inventory
        .route("/trains", get(trains::list_trains))
        .route("/trains/:id", get(trains::get_train))
        .route("/trains/:id/seats", put(trains::update_available_seats))
        // User directory
        .route("/users/signup", post(users::sign_up))
        .route("/users/login", post(users::login))
        .route("/users/:id", get(users::get_user));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api_routes)
        .layer(request_id_layer())
        .with_state(state)
}
