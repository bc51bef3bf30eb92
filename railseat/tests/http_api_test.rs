//! HTTP surface over the assembled router.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::{Harness, config};
use railseat::api::reservations::ReservationAck;
use railseat::api::users::LoginResponse;
use railseat::server::health::HealthResponse;
use railseat::types::{ReservationDetail, RiderId, RiderProfile, Seat, TrainRun};
use railseat_web::ErrorBody;
use serde_json::json;

async fn server() -> (Harness, TestServer) {
    let harness = Harness::start(config()).await;
    let server = TestServer::new(harness.router()).unwrap();
    (harness, server)
}

#[tokio::test]
async fn health_reports_ok() {
    let (harness, server) = server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<HealthResponse>().status, "ok");

    // Metrics are disabled in this configuration.
    server.get("/metrics").await.assert_status(StatusCode::NOT_FOUND);

    harness.stop().await;
}

#[tokio::test]
async fn reservation_lifecycle_over_http() {
    let (harness, server) = server().await;

    let response = server
        .post("/api/v1/reservations")
        .add_query_param("userId", 1)
        .json(&json!({"trainId": 100, "seatNumber": "1A"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let ack: ReservationAck = response.json();

    harness.drain().await;

    let seats: Vec<Seat> = server
        .get("/api/v1/seats")
        .add_query_param("trainId", 100)
        .await
        .json();
    assert!(seats.iter().any(|s| s.seat_number == "1A" && s.reserved));

    let train: TrainRun = server.get("/api/v1/trains/100").await.json();
    assert_eq!(train.available_seats, 3);

    let detail: ReservationDetail = server
        .get(&format!("/api/v1/reservations/{}", ack.reservation_id))
        .await
        .json();
    assert_eq!(detail.seat_number, "1A");
    assert_eq!(detail.departure_station, "Seoul");

    let list: Vec<ReservationDetail> = server
        .get("/api/v1/reservations")
        .add_query_param("userId", 1)
        .await
        .json();
    assert_eq!(list.len(), 1);

    server
        .delete(&format!("/api/v1/reservations/{}", ack.reservation_id))
        .await
        .assert_status_ok();

    let response = server
        .get(&format!("/api/v1/reservations/{}", ack.reservation_id))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorBody>().code, "RESERVATION_NOT_FOUND");

    harness.stop().await;
}

#[tokio::test]
async fn domain_errors_render_as_400_with_code() {
    let (harness, server) = server().await;

    let response = server
        .get("/api/v1/reservations")
        .add_query_param("userId", 2)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorBody>().code, "NO_RESERVATIONS");

    let response = server
        .post("/api/v1/reservations")
        .add_query_param("userId", 1)
        .json(&json!({"trainId": 999, "seatNumber": "1A"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json();
    assert_eq!(body.code, "TRAIN_NOT_FOUND");
    assert!(body.message.contains("train"));

    let response = server
        .post("/api/v1/reservations")
        .add_query_param("userId", 1)
        .json(&json!({"trainId": 100, "seatNumber": "  "}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorBody>().code, "INVALID_INPUT");

    let response = server
        .get("/api/v1/seats")
        .add_query_param("trainId", 999)
        .await;
    assert_eq!(response.json::<ErrorBody>().code, "SEAT_NOT_FOUND");

    harness.stop().await;
}

#[tokio::test]
async fn simultaneous_seat_reserves_have_one_winner() {
    let (harness, server) = server().await;

    let (a, b) = tokio::join!(
        async { server.post("/api/v1/seats/1/reserve").await },
        async { server.post("/api/v1/seats/1/reserve").await },
    );

    let mut statuses = [a.status_code(), b.status_code()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

    let loser = if a.status_code() == StatusCode::OK { b } else { a };
    assert_eq!(loser.json::<ErrorBody>().code, "SEAT_ALREADY_RESERVED");

    let response = server.post("/api/v1/seats/1/cancel").await;
    response.assert_status_ok();
    assert!(!response.json::<Seat>().reserved);

    let response = server.post("/api/v1/seats/1/cancel").await;
    assert_eq!(response.json::<ErrorBody>().code, "SEAT_NOT_RESERVED");

    harness.stop().await;
}

#[tokio::test]
async fn trains_listing_and_counter_update() {
    let (harness, server) = server().await;

    let trains: Vec<TrainRun> = server.get("/api/v1/trains").await.json();
    assert_eq!(trains.len(), 2);

    let train: TrainRun = server
        .put("/api/v1/trains/100/seats")
        .add_query_param("availableSeats", 1)
        .await
        .json();
    assert_eq!(train.available_seats, 1);

    let response = server
        .put("/api/v1/trains/100/seats")
        .add_query_param("availableSeats", 5)
        .await;
    assert_eq!(response.json::<ErrorBody>().code, "INVALID_INPUT");

    harness.stop().await;
}

#[tokio::test]
async fn sign_up_login_and_profile() {
    let (harness, server) = server().await;

    let response = server
        .post("/api/v1/users/signup")
        .json(&json!({
            "username": "hana",
            "name": "Hana Lee",
            "email": "hana@example.com",
            "password": "s3cret"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let profile: RiderProfile = response.json();

    let login: LoginResponse = server
        .post("/api/v1/users/login")
        .json(&json!({"username": "hana", "password": "s3cret"}))
        .await
        .json();
    assert_eq!(login.user_id, profile.id);

    let response = server
        .post("/api/v1/users/login")
        .json(&json!({"username": "hana", "password": "wrong"}))
        .await;
    assert_eq!(response.json::<ErrorBody>().code, "WRONG_CREDENTIALS");

    let response = server
        .post("/api/v1/users/signup")
        .json(&json!({
            "username": "hana",
            "name": "Other",
            "email": "other@example.com",
            "password": "x"
        }))
        .await;
    assert_eq!(response.json::<ErrorBody>().code, "DUPLICATE_RIDER");

    let fetched: RiderProfile = server
        .get(&format!("/api/v1/users/{}", profile.id))
        .await
        .json();
    assert_eq!(fetched, profile);

    let response = server.get("/api/v1/users/404").await;
    assert_eq!(response.json::<ErrorBody>().code, "RIDER_NOT_FOUND");
    assert_ne!(profile.id, RiderId::new(404));

    harness.stop().await;
}
