//! Recorded location requests.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use http_body_util::{Empty, Full};
use live_track::{Coordinate, HistorySource, Location};
use realtime::{Config, HttpRequest, bad_request, not_found};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::HistoryCache;
use crate::vehicles::{decode, ensure_success};

#[derive(Deserialize)]
struct LocationsEnvelope {
    #[serde(default)]
    results: Vec<Location>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Created {
    Envelope { result: Location },
    Bare(Location),
}

/// Fetch the recorded locations of a vehicle, oldest first.
///
/// The backend returns the newest record first; the order is reversed here so
/// callers always receive ascending timestamps.
///
/// # Errors
///
/// Returns [`realtime::Error::NotFound`] for an unknown vehicle, or an error
/// when the request fails or the response cannot be deserialized.
pub async fn locations<P>(vehicle_id: &str, provider: &P) -> Result<Vec<Location>>
where
    P: Config + HttpRequest,
{
    let api_url = Config::get(provider, "API_URL").await.context("getting `API_URL`")?;

    let request = http::Request::builder()
        .method(Method::GET)
        .uri(format!("{api_url}/vehicles/{}/locations", urlencoding::encode(vehicle_id)))
        .header(CONTENT_TYPE, "application/json")
        .body(Empty::<Bytes>::new())
        .context("building locations request")?;

    let response =
        HttpRequest::fetch(provider, request).await.context("fetching vehicle locations")?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(not_found!("vehicle {vehicle_id} not found").into());
    }
    let response = ensure_success(response, "failed to fetch vehicle locations")?;

    let envelope: LocationsEnvelope =
        decode(response.body()).context("deserializing vehicle locations")?;
    let mut records = envelope.results;
    records.reverse();

    debug!(vehicle_id = %vehicle_id, count = records.len(), "fetched vehicle locations");
    Ok(records)
}

/// A location to record for a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCreate {
    pub vehicle_id: String,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    #[serde(default)]
    pub speed: f64,
}

impl LocationCreate {
    /// Check the payload before sending.
    ///
    /// # Errors
    ///
    /// Returns [`realtime::Error::BadRequest`] when the vehicle id is blank,
    /// a coordinate is out of range, or the speed is negative.
    pub fn validate(&self) -> realtime::Result<()> {
        if self.vehicle_id.trim().is_empty() {
            return Err(bad_request!("vehicle id is required"));
        }
        if self.latitude.degrees().is_none_or(|lat| !(-90.0..=90.0).contains(&lat)) {
            return Err(bad_request!("invalid latitude: {}", self.latitude));
        }
        if self.longitude.degrees().is_none_or(|lng| !(-180.0..=180.0).contains(&lng)) {
            return Err(bad_request!("invalid longitude: {}", self.longitude));
        }
        if !self.speed.is_finite() || self.speed < 0.0 {
            return Err(bad_request!("invalid speed: {}", self.speed));
        }
        Ok(())
    }
}

/// Record a location.
///
/// # Errors
///
/// Returns [`realtime::Error::BadRequest`] for an invalid payload, or an
/// error when the request fails or the response cannot be deserialized.
pub async fn create_location<P>(location: &LocationCreate, provider: &P) -> Result<Location>
where
    P: Config + HttpRequest,
{
    location.validate()?;
    let api_url = Config::get(provider, "API_URL").await.context("getting `API_URL`")?;

    let body = serde_json::to_vec(location).context("serializing location")?;
    let request = http::Request::builder()
        .method(Method::POST)
        .uri(format!("{api_url}/locations"))
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .context("building create location request")?;

    let response = HttpRequest::fetch(provider, request).await.context("creating location")?;
    let response = ensure_success(response, "failed to create location")?;

    let created = match decode(response.body()).context("deserializing location")? {
        Created::Envelope { result } | Created::Bare(result) => result,
    };
    Ok(created)
}

/// Location requests bound to a provider, with a history cache in front of
/// [`locations`].
pub struct LocationsApi<P> {
    provider: Arc<P>,
    cache: HistoryCache,
}

impl<P> Clone for LocationsApi<P> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider), cache: self.cache.clone() }
    }
}

impl<P> LocationsApi<P>
where
    P: Config + HttpRequest + 'static,
{
    #[must_use]
    pub const fn new(provider: Arc<P>, cache: HistoryCache) -> Self {
        Self { provider, cache }
    }

    #[must_use]
    pub const fn cache(&self) -> &HistoryCache {
        &self.cache
    }

    /// Record a location and invalidate the vehicle's cached history, so the
    /// next fetch sees it.
    ///
    /// # Errors
    ///
    /// Returns an error when the location could not be recorded; the cache is
    /// left untouched in that case.
    pub async fn create_location(&self, location: &LocationCreate) -> Result<Location> {
        let created = create_location(location, self.provider.as_ref()).await?;
        self.cache.invalidate(&location.vehicle_id);
        info!(vehicle_id = %location.vehicle_id, location_id = %created.id, "location recorded");
        Ok(created)
    }
}

impl<P> HistorySource for LocationsApi<P>
where
    P: Config + HttpRequest + 'static,
{
    async fn history(&self, vehicle_id: &str) -> Result<Vec<Location>> {
        if let Some(records) = self.cache.get(vehicle_id) {
            debug!(vehicle_id = %vehicle_id, "history served from cache");
            return Ok(records);
        }
        let records = locations(vehicle_id, self.provider.as_ref()).await?;
        self.cache.insert(vehicle_id, records.clone());
        Ok(records)
    }
}
