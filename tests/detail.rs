//! Tests for the dashboard and the vehicle detail view.


use std::sync::Arc;
use std::time::Duration;

use fleet_tracker::fleet_api::{LocationCreate, VehicleQuery};
use fleet_tracker::live_track::{
    Backoff, ConnectionState, HistoryStatus, JOIN_EVENT, TrackSnapshot,
};
use fleet_tracker::realtime::{PushEvent, SocketEvent};
use fleet_tracker::{Config, Dashboard, DetailState, LiveTransport, MapView, Transports};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::provider::{
    API_URL, MockEventSource, MockProvider, MockSocketChannel, WS_URL, eventually, location,
    vehicle, wait_until,
};

fn config(transport: LiveTransport) -> Config {
    Config {
        api_url: API_URL.to_string(),
        ws_url: WS_URL.to_string(),
        transport,
        timezone: chrono_tz::Europe::Istanbul,
        history_stale_after: Duration::from_secs(30),
        reconnect: Backoff {
            base: Duration::from_millis(10),
            max: Duration::from_millis(50),
            max_attempts: 1,
        },
    }
}

fn dashboard(provider: &MockProvider, transport: LiveTransport) -> Dashboard<MockProvider> {
    Dashboard::new(Arc::new(provider.clone()), config(transport))
}

type Mocks = (Transports<MockEventSource, MockSocketChannel>, MockEventSource, MockSocketChannel);

fn transports() -> Mocks {
    let events = MockEventSource::default();
    let sockets = MockSocketChannel::default();
    (Transports { events: events.clone(), sockets: sockets.clone() }, events, sockets)
}

fn map(state: DetailState) -> MapView {
    match state {
        DetailState::Track(map) => map,
        DetailState::InvalidVehicleId => panic!("expected a track"),
    }
}

fn loaded(snapshot: &TrackSnapshot) -> bool {
    snapshot.history == HistoryStatus::Loaded
}

// Should stream the vehicle over the push channel and pin the latest record.
#[tokio::test]
async fn push_detail_view() {
    let provider = MockProvider::new(vec![vehicle("veh-1")]).with_locations(
        "veh-1",
        vec![location("loc-1", "veh-1", 10), location("loc-2", "veh-1", 20)],
    );
    let dashboard = dashboard(&provider, LiveTransport::PushStream);
    let (transports, events, _) = transports();

    let view = dashboard.open_detail(transports, Some("veh-1")).await.expect("should mount");
    assert_eq!(view.transport(), LiveTransport::PushStream);
    let mut snapshots = view.subscribe();
    wait_until(&mut snapshots, loaded).await;

    let channel = events.wait_for_channel(0).await;
    assert_eq!(channel.url, format!("{API_URL}/locations/vehicle/veh-1/stream"));
    channel.send(PushEvent::Open);
    channel.message(&location("loc-3", "veh-1", 30));
    wait_until(&mut snapshots, |s| s.track.len() == 3 && s.connection.is_connected()).await;

    let map = map(view.render());
    let ids: Vec<&str> = map.markers.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["loc-1", "loc-2", "loc-3"]);
    assert_eq!(map.latest().map(|m| m.id.as_str()), Some("loc-3"));
    assert_eq!(map.status, "Streaming");
    assert_eq!(map.vehicle_id.as_deref(), Some("veh-1"));

    view.unmount().await.expect("should unmount");
}

// Should join the vehicle's room when mounted on the socket channel.
#[tokio::test]
async fn socket_detail_view() {
    let provider = MockProvider::new(vec![vehicle("veh-1")]);
    let dashboard = dashboard(&provider, LiveTransport::Socket);
    let (transports, events, sockets) = transports();

    let view = dashboard.open_detail(transports, Some("veh-1")).await.expect("should mount");
    let mut snapshots = view.subscribe();

    let socket = sockets.wait_for_socket(0).await;
    assert_eq!(socket.url, WS_URL);
    assert_eq!(socket.emitted(), vec![(JOIN_EVENT.to_string(), json!({"vehicleId": "veh-1"}))]);

    socket.send(SocketEvent::Connect);
    socket.update(json!([
        serde_json::to_value(location("loc-2", "veh-1", 20)).expect("should serialize"),
        serde_json::to_value(location("loc-1", "veh-1", 10)).expect("should serialize"),
    ]));
    let snapshot = wait_until(&mut snapshots, |s| s.track.len() == 2).await;
    assert_eq!(snapshot.connection, ConnectionState::Connected);
    assert!(events.opened().is_empty());

    let map = map(view.render());
    assert_eq!(map.latest().map(|m| m.id.as_str()), Some("loc-2"));
    view.unmount().await.expect("should unmount");
}

// Should render the invalid-id state without opening any channel.
#[tokio::test]
async fn missing_vehicle_id() {
    let provider = MockProvider::new(vec![vehicle("veh-1")]);
    let dashboard = dashboard(&provider, LiveTransport::Socket);

    for vehicle_id in [None, Some("   ")] {
        let (transports, _, sockets) = transports();
        let view = dashboard.open_detail(transports, vehicle_id).await.expect("should mount");

        assert_eq!(view.vehicle_id(), None);
        assert_eq!(view.render(), DetailState::InvalidVehicleId);
        view.unmount().await.expect("should unmount");
        assert!(sockets.sockets().is_empty());
    }
    assert_eq!(provider.history_fetches("veh-1"), 0);
}

// Should close the old socket and rebuild the track when navigating.
#[tokio::test]
async fn navigate_retargets() {
    let provider = MockProvider::new(vec![vehicle("veh-1"), vehicle("veh-2")])
        .with_locations("veh-1", vec![location("loc-1", "veh-1", 10)])
        .with_locations("veh-2", vec![location("loc-9", "veh-2", 90)]);
    let dashboard = dashboard(&provider, LiveTransport::Socket);
    let (transports, _, sockets) = transports();

    let mut view = dashboard.open_detail(transports, Some("veh-1")).await.expect("should mount");
    let mut snapshots = view.subscribe();
    wait_until(&mut snapshots, loaded).await;
    let first = sockets.wait_for_socket(0).await;

    view.navigate(Some(" veh-2 ")).await.expect("should navigate");
    assert_eq!(view.vehicle_id(), Some("veh-2"));

    let snapshot = wait_until(&mut snapshots, |s| {
        s.vehicle_id.as_deref() == Some("veh-2") && s.history == HistoryStatus::Loaded
    })
    .await;
    assert_eq!(snapshot.track.records().to_vec(), vec![location("loc-9", "veh-2", 90)]);

    let second = sockets.wait_for_socket(1).await;
    assert!(first.is_closed());
    assert_eq!(second.emitted(), vec![(JOIN_EVENT.to_string(), json!({"vehicleId": "veh-2"}))]);

    view.unmount().await.expect("should unmount");
}

// Should pick up a recorded location on refresh.
#[tokio::test]
async fn recorded_location_on_refresh() {
    let provider = MockProvider::new(vec![vehicle("veh-1")])
        .with_locations("veh-1", vec![location("loc-1", "veh-1", 10)]);
    let dashboard = dashboard(&provider, LiveTransport::PushStream);
    let (transports, _, _) = transports();

    let view = dashboard.open_detail(transports, Some("veh-1")).await.expect("should mount");
    let mut snapshots = view.subscribe();
    wait_until(&mut snapshots, loaded).await;

    let created = dashboard
        .create_location(&LocationCreate {
            vehicle_id: "veh-1".to_string(),
            latitude: "39.95".into(),
            longitude: "32.90".into(),
            speed: 55.0,
        })
        .await
        .expect("should record location");
    assert_eq!(created.id, "posted-2");

    view.refresh().await.expect("should refresh");
    let snapshot = wait_until(&mut snapshots, |s| s.track.get("posted-2").is_some()).await;
    assert_eq!(snapshot.track.len(), 2);
    assert_eq!(provider.history_fetches("veh-1"), 2);

    view.unmount().await.expect("should unmount");
}

// Should reuse a fresh history when the same vehicle is opened again.
#[tokio::test]
async fn reopened_view_uses_cache() {
    let provider = MockProvider::new(vec![vehicle("veh-1")])
        .with_locations("veh-1", vec![location("loc-1", "veh-1", 10)]);
    let dashboard = dashboard(&provider, LiveTransport::PushStream);

    for _ in 0..2 {
        let (transports, _, _) = transports();
        let view = dashboard.open_detail(transports, Some("veh-1")).await.expect("should mount");
        let mut snapshots = view.subscribe();
        let snapshot = wait_until(&mut snapshots, loaded).await;
        assert_eq!(snapshot.track.len(), 1);
        view.unmount().await.expect("should unmount");
    }
    assert_eq!(provider.history_fetches("veh-1"), 1);
}

// Should release the live channel when the view unmounts.
#[tokio::test]
async fn unmount_closes_channel() {
    let provider = MockProvider::new(vec![vehicle("veh-1")]);
    let dashboard = dashboard(&provider, LiveTransport::PushStream);
    let (transports, events, _) = transports();

    let view = dashboard.open_detail(transports, Some("veh-1")).await.expect("should mount");
    let channel = events.wait_for_channel(0).await;
    assert!(!channel.is_closed());

    view.unmount().await.expect("should unmount");
    eventually(|| channel.is_closed()).await;
}

// Should load the vehicle card through the dashboard.
#[tokio::test]
async fn vehicle_card() {
    let provider = MockProvider::new(vec![vehicle("veh-1"), vehicle("veh-2")]);
    let dashboard = dashboard(&provider, LiveTransport::Socket);
    let (transports, _, _) = transports();

    let page = dashboard.vehicles(&VehicleQuery::default()).await.expect("should list vehicles");
    assert_eq!(page.results.len(), 2);

    let vehicle = dashboard.vehicle("veh-2").await.expect("should fetch vehicle");
    let view = dashboard.open_detail(transports, Some("veh-2")).await.expect("should mount");
    let summary = view.layer().summary(&vehicle);
    assert_eq!(summary.plate_number, "06 veh-2");
    assert_eq!(summary.status, "Active");
    view.unmount().await.expect("should unmount");
}
