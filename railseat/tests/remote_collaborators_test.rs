//! Orchestrator validating against another process over HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{Harness, config};
use railseat::clients::{HttpSeatStore, HttpTrainInventory};
use railseat::error::{ConflictKind, Entity, ReservationError};
use railseat::events::queues;
use railseat::types::{RiderId, SeatId, SeatRef, TrainId};
use railseat_broker::InMemoryBroker;
use std::net::SocketAddr;
use tokio::net::TcpListener;

const U1: RiderId = RiderId::new(1);
const U2: RiderId = RiderId::new(2);
const T100: TrainId = TrainId::new(100);

/// Serve `owner`'s router on an ephemeral port.
async fn serve(owner: &Harness) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let router = owner.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    address
}

fn remote_config(address: SocketAddr) -> railseat::Config {
    let base = format!("http://{address}/api/v1");
    let mut config = config();
    config.collaborators.user_service_url = Some(base.clone());
    config.collaborators.train_service_url = Some(base.clone());
    config.collaborators.seat_service_url = Some(base);
    config
}

async fn orchestrator_against(address: SocketAddr) -> Harness {
    Harness::start(remote_config(address)).await
}

#[tokio::test]
async fn reserve_validates_against_the_remote_services() {
    let owner = Harness::start(config()).await;
    let address = serve(&owner).await;
    let orchestrator = orchestrator_against(address).await;

    let id = orchestrator.desk().reserve(U1, T100, "1A").await.unwrap();
    let detail = orchestrator.desk().get_reservation(id).await.unwrap();
    assert_eq!(detail.train_name, "KTX 101");

    let error = orchestrator
        .desk()
        .reserve(U1, TrainId::new(999), "1A")
        .await
        .unwrap_err();
    assert_eq!(error, ReservationError::NotFound(Entity::Train));

    let error = orchestrator
        .desk()
        .reserve(RiderId::new(77), T100, "1A")
        .await
        .unwrap_err();
    assert_eq!(error, ReservationError::NotFound(Entity::Rider));

    orchestrator.stop().await;
    owner.stop().await;
}

#[tokio::test]
async fn remote_seat_state_drives_the_pre_check() {
    let owner = Harness::start(config()).await;
    let address = serve(&owner).await;
    let orchestrator = orchestrator_against(address).await;

    owner
        .resources
        .seats
        .reserve(SeatRef::position(T100, "1B"))
        .await
        .unwrap();

    let error = orchestrator
        .desk()
        .reserve(U1, T100, "1B")
        .await
        .unwrap_err();
    assert_eq!(
        error,
        ReservationError::Conflict(ConflictKind::SeatAlreadyReserved)
    );

    orchestrator.stop().await;
    owner.stop().await;
}

#[tokio::test]
async fn unreachable_collaborator_is_unavailable() {
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let orchestrator = orchestrator_against(address).await;

    let error = orchestrator
        .desk()
        .reserve(U1, T100, "1A")
        .await
        .unwrap_err();
    assert!(matches!(error, ReservationError::Unavailable(_)));
    assert!(orchestrator.bus.published().is_empty());

    orchestrator.stop().await;
}

#[tokio::test]
async fn owner_applies_events_from_a_remote_orchestrator() {
    let broker = InMemoryBroker::new();
    let owner = Harness::start_on(config(), broker.clone()).await;
    let address = serve(&owner).await;
    let orchestrator = Harness::start_on(remote_config(address), broker.clone()).await;

    // Only the owner drains the seat and train queues.
    assert_eq!(
        broker.queues(),
        vec![queues::SEAT_SERVICE.to_string(), queues::TRAIN_SERVICE.to_string()]
    );

    orchestrator.desk().reserve(U1, T100, "1A").await.unwrap();
    owner.drain().await;

    let seat = owner
        .resources
        .seats
        .get(&SeatRef::position(T100, "1A"))
        .await
        .unwrap();
    assert!(seat.reserved);
    assert_eq!(owner.resources.trains.get(T100).await.unwrap().available_seats, 3);
    let untouched = orchestrator
        .resources
        .seats
        .get(&SeatRef::position(T100, "1A"))
        .await
        .unwrap();
    assert!(!untouched.reserved);

    let error = orchestrator
        .desk()
        .reserve(U2, T100, "1A")
        .await
        .unwrap_err();
    assert_eq!(
        error,
        ReservationError::Conflict(ConflictKind::SeatAlreadyReserved)
    );

    orchestrator.stop().await;
    owner.stop().await;
}

#[tokio::test]
async fn seat_and_counter_writes_reach_the_owner() {
    let owner = Harness::start(config()).await;
    let address = serve(&owner).await;
    let base = format!("http://{address}/api/v1");
    let seats = HttpSeatStore::new(base.clone());
    let trains = HttpTrainInventory::new(base);

    let id = owner
        .resources
        .seats
        .get(&SeatRef::position(T100, "1A"))
        .await
        .unwrap()
        .id;

    assert!(seats.reserve(id).await.unwrap().reserved);
    assert_eq!(
        seats.reserve(id).await.unwrap_err(),
        ReservationError::Conflict(ConflictKind::SeatAlreadyReserved)
    );
    assert!(!seats.cancel(id).await.unwrap().reserved);
    assert_eq!(
        seats.reserve(SeatId::new(999)).await.unwrap_err(),
        ReservationError::NotFound(Entity::Seat)
    );

    assert_eq!(
        trains.update_available_seats(T100, 2).await.unwrap().available_seats,
        2
    );
    assert!(matches!(
        trains.update_available_seats(T100, 5).await,
        Err(ReservationError::InvalidInput(_))
    ));
    assert_eq!(owner.resources.trains.get(T100).await.unwrap().available_seats, 2);

    owner.stop().await;
}
