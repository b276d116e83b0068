//! Location records as exchanged over every delivery channel.

use std::fmt;

use chrono::{DateTime, Utc};
use realtime::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// A decimal geographic coordinate, kept as the text it was delivered as.
///
/// Producers send coordinates either as JSON strings or numbers. Both are
/// stored verbatim and only parsed when a numeric value is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Coordinate(String);

impl Coordinate {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value in decimal degrees, if the text is a finite number.
    #[must_use]
    pub fn degrees(&self) -> Option<f64> {
        self.0.trim().parse::<f64>().ok().filter(|value| value.is_finite())
    }
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for Coordinate {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(number) => Self(number.to_string()),
        })
    }
}

/// A single position observation for a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Unique observation identifier, stable across channels.
    pub id: String,

    /// Owning vehicle.
    pub vehicle_id: String,

    pub latitude: Coordinate,
    pub longitude: Coordinate,

    /// Instantaneous speed.
    #[serde(default)]
    pub speed: f64,

    /// Capture time. The only ordering key.
    pub timestamp: DateTime<Utc>,
}

impl Location {
    /// Decode a text-encoded record and check its coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] when the payload is not a location
    /// record and [`Error::InvalidCoordinate`] when latitude or longitude is
    /// not a valid geographic coordinate.
    pub fn decode(payload: &str) -> Result<Self> {
        let location: Self = serde_json::from_str(payload)?;
        if location.position().is_none() {
            return Err(Error::InvalidCoordinate(format!(
                "{}, {}",
                location.latitude, location.longitude
            )));
        }
        Ok(location)
    }

    /// Latitude and longitude in decimal degrees, when both are in range.
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.degrees().filter(|lat| (-90.0..=90.0).contains(lat))?;
        let lng = self.longitude.degrees().filter(|lng| (-180.0..=180.0).contains(lng))?;
        Some((lat, lng))
    }
}

/// Records delivered together: one observation or a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Update {
    Single(Location),
    Batch(Vec<Location>),
}

impl Update {
    #[must_use]
    pub fn into_records(self) -> Vec<Location> {
        match self {
            Self::Single(location) => vec![location],
            Self::Batch(locations) => locations,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(locations) => locations.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The record with the greatest timestamp. Later records win ties.
    #[must_use]
    pub fn latest(&self) -> Option<&Location> {
        match self {
            Self::Single(location) => Some(location),
            Self::Batch(locations) => locations.iter().max_by_key(|location| location.timestamp),
        }
    }
}

impl From<Location> for Update {
    fn from(location: Location) -> Self {
        Self::Single(location)
    }
}

impl From<Vec<Location>> for Update {
    fn from(locations: Vec<Location>) -> Self {
        Self::Batch(locations)
    }
}
