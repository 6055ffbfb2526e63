//! Driven flights: the actor handle and the multi-flight manager.

use std::sync::Arc;
use std::time::Duration;

use helm_component::{ComponentKind, ComponentRegistry, EntityId};
use helm_ecs::{ComponentQuery, Mutation};
use helm_flight::{FlightConfig, FlightError, FlightId, FlightManager, TickConfig};
use helm_notify::Filter;
use helm_physics::BackendKind;
use serde_json::json;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn manager() -> FlightManager {
    FlightManager::new(Arc::new(ComponentRegistry::standard()))
}

fn config(name: &str, tick: TickConfig) -> FlightConfig {
    FlightConfig::new()
        .with_name(name)
        .with_tick(tick)
        .with_physics(BackendKind::PointMass)
}

#[tokio::test]
async fn test_driver_stops_at_tick_limit() {
    let flights = manager();
    let handle = flights
        .create(config("limited", TickConfig::fixed(500.0).with_max_ticks(5)))
        .unwrap();

    let status = timeout(WAIT, async {
        loop {
            let status = handle.status().await.unwrap();
            if !status.running {
                break status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(status.tick, 5);
    assert_eq!(status.name, "limited");
    assert_eq!(status.faults, 0);
}

#[tokio::test]
async fn test_mutations_and_queries_through_handle() {
    let flights = manager();
    let handle = flights
        .create(config("handle", TickConfig::fixed(200.0)))
        .unwrap();

    let ship = handle
        .mutate(Mutation::create("position", json!({"x": 1.0})))
        .await
        .unwrap();
    assert!(ship.created);
    handle
        .mutate(Mutation::add(ship.entity, "hull", json!({"value": 70.0})))
        .await
        .unwrap();

    let views = handle
        .query(ComponentQuery::components(["hull"]).for_entity(ship.entity))
        .await
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].components["hull"]["value"], json!(70.0));

    let err = handle
        .mutate(Mutation::update(EntityId(999), "hull", json!({})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "entityNotFound");

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.world.entities.len(), 1);
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn test_channel_subscription_sees_tick_changes() {
    let flights = manager();
    let handle = flights
        .create(config("watched", TickConfig::fixed(200.0)))
        .unwrap();
    let mut sub = handle.subscribe_channel(Filter::components([ComponentKind::Position]));

    let ship = handle
        .mutate(Mutation::create("position", json!({})))
        .await
        .unwrap()
        .entity;
    handle
        .mutate(Mutation::add(ship, "velocity", json!({"x": 1.0})))
        .await
        .unwrap();

    let set = timeout(WAIT, async {
        loop {
            let set = sub.recv().await.unwrap();
            if set.get(ship, Some(ComponentKind::Position)).is_some() {
                break set;
            }
        }
    })
    .await
    .unwrap();
    assert!(set.iter().all(|r| r.component == Some(ComponentKind::Position)
        || r.component.is_none()));

    handle.stop().await.unwrap();
    // the hub closes every subscription on teardown
    let closed = timeout(WAIT, async {
        while sub.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_stop_releases_physics_and_rejects_later_requests() {
    let flights = manager();
    let handle = flights
        .create(config("stopping", TickConfig::fixed(100.0)))
        .unwrap();
    let space = handle
        .mutate(Mutation::create("physicsWorld", json!({})))
        .await
        .unwrap()
        .entity;
    assert_ne!(space, EntityId::INVALID);

    let report = flights.stop(handle.id()).await.unwrap();
    // the world is built lazily by the physics system on the first tick
    assert!(report.worlds <= 1);
    assert_eq!(report.bodies, 0);
    assert!(flights.is_empty());

    assert_eq!(handle.status().await.unwrap_err(), FlightError::Stopped);
    assert_eq!(
        flights.stop(handle.id()).await.unwrap_err(),
        FlightError::UnknownFlight(handle.id())
    );
}

#[tokio::test]
async fn test_manager_keeps_flights_isolated() {
    let flights = manager();
    let a = flights.create(config("alpha", TickConfig::fixed(100.0))).unwrap();
    let b = flights.create(config("beta", TickConfig::fixed(100.0))).unwrap();
    assert_eq!(flights.len(), 2);

    a.mutate(Mutation::create("hull", json!({}))).await.unwrap();
    a.mutate(Mutation::create("hull", json!({}))).await.unwrap();
    b.mutate(Mutation::create("hull", json!({}))).await.unwrap();

    let statuses = flights.list().await;
    assert_eq!(statuses.len(), 2);
    let count = |id: FlightId| statuses.iter().find(|s| s.id == id).unwrap().entities;
    assert_eq!(count(a.id()), 2);
    assert_eq!(count(b.id()), 1);

    let mut ids = vec![a.id(), b.id()];
    ids.sort();
    assert_eq!(flights.ids(), ids);
    assert_eq!(flights.get(b.id()).unwrap().name(), "beta");
    assert!(matches!(
        flights.get(FlightId::new()),
        Err(FlightError::UnknownFlight(_))
    ));

    let stopped = flights.stop_all().await;
    assert_eq!(stopped.len(), 2);
    assert!(stopped.iter().all(|(_, r)| r.is_ok()));
    assert!(flights.is_empty());
}

#[tokio::test]
async fn test_restore_through_manager_resumes_state() {
    let flights = manager();
    let first = flights
        .create(config("original", TickConfig::fixed(200.0).with_max_ticks(3)))
        .unwrap();
    let e = first
        .mutate(Mutation::create("hull", json!({"value": 12.0})))
        .await
        .unwrap()
        .entity;
    let snapshot = first.snapshot().await.unwrap();
    flights.stop(first.id()).await.unwrap();

    let second = flights
        .restore(config("copy", TickConfig::fixed(200.0)), snapshot.clone())
        .unwrap();
    let views = second
        .query(ComponentQuery::components(["hull"]).for_entity(e))
        .await
        .unwrap();
    assert_eq!(views[0].components["hull"]["value"], json!(12.0));
    assert!(second.status().await.unwrap().tick >= snapshot.tick);
    flights.stop_all().await;
}
