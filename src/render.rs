//! # Map layer
//!
//! Projects track snapshots onto the map: one marker per record, a path
//! through them in track order, and a pin on the latest position.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fleet_api::Vehicle;
use live_track::{ConnectionState, HistoryStatus, Location, TrackSnapshot};
use serde::Serialize;

/// Map center used before any position is known.
pub const DEFAULT_CENTER: Position = Position { lat: 39.925_533, lng: 32.866_287 };
pub const DEFAULT_ZOOM: u8 = 6;

const TITLE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";
const CREATED_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerStyle {
    /// A past position.
    Trail,

    /// The most recent position.
    Latest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: String,
    pub position: Position,

    /// Capture time in the display timezone.
    pub title: String,

    /// Speed with one decimal, e.g. `42.5 km/h`.
    pub speed: String,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub vehicle_id: Option<String>,
    pub markers: Vec<Marker>,
    pub path: Vec<Position>,
    pub center: Position,
    pub zoom: u8,
    pub connection: ConnectionState,
    pub status: &'static str,
    pub history: HistoryStatus,
    pub error: Option<String>,
}

impl MapView {
    /// The latest-position marker, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.style == MarkerStyle::Latest)
    }
}

/// Vehicle card shown above the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary {
    pub plate_number: String,
    pub driver_name: String,
    pub status: &'static str,
    pub created: String,
}

#[must_use]
pub const fn connection_label(connection: ConnectionState) -> &'static str {
    match connection {
        ConnectionState::Connected => "Streaming",
        ConnectionState::Disconnected => "Disconnected",
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MapLayer {
    timezone: Tz,
}

impl MapLayer {
    #[must_use]
    pub const fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    #[must_use]
    pub fn title(&self, timestamp: DateTime<Utc>) -> String {
        timestamp.with_timezone(&self.timezone).format(TITLE_FORMAT).to_string()
    }

    /// Project `snapshot` onto the map.
    ///
    /// Records whose coordinates do not parse are left off the map. The last
    /// record that can be placed carries the latest-position pin.
    #[must_use]
    pub fn project(&self, snapshot: &TrackSnapshot) -> MapView {
        let placed: Vec<(&Location, Position)> = snapshot
            .track
            .iter()
            .filter_map(|location| {
                let (lat, lng) = location.position()?;
                Some((location, Position { lat, lng }))
            })
            .collect();

        let last = placed.len().saturating_sub(1);
        let markers = placed
            .iter()
            .enumerate()
            .map(|(index, (location, position))| Marker {
                id: location.id.clone(),
                position: *position,
                title: self.title(location.timestamp),
                speed: format!("{:.1} km/h", location.speed),
                style: if index == last { MarkerStyle::Latest } else { MarkerStyle::Trail },
            })
            .collect();

        MapView {
            vehicle_id: snapshot.vehicle_id.clone(),
            markers,
            path: placed.iter().map(|(_, position)| *position).collect(),
            center: placed.last().map_or(DEFAULT_CENTER, |(_, position)| *position),
            zoom: DEFAULT_ZOOM,
            connection: snapshot.connection,
            status: connection_label(snapshot.connection),
            history: snapshot.history.clone(),
            error: snapshot.error.clone(),
        }
    }

    #[must_use]
    pub fn summary(&self, vehicle: &Vehicle) -> VehicleSummary {
        VehicleSummary {
            plate_number: vehicle.plate_number.clone(),
            driver_name: vehicle.driver_name.clone(),
            status: if vehicle.is_active { "Active" } else { "Inactive" },
            created: vehicle
                .created_at
                .with_timezone(&self.timezone)
                .format(CREATED_FORMAT)
                .to_string(),
        }
    }
}
