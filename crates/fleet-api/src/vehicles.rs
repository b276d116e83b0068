//! Vehicle registry requests.

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::CONTENT_TYPE;
use http::{Method, Response, StatusCode};
use http_body_util::{Empty, Full};
use realtime::{Config, HttpRequest, bad_gateway, bad_request, not_found};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::query::QueryBuilder;

/// A registered vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub plate_number: String,
    pub driver_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Registration payload for a new vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleCreate {
    pub plate_number: String,
    pub driver_name: String,
    pub is_active: bool,
}

impl VehicleCreate {
    /// Check required fields before sending.
    ///
    /// # Errors
    ///
    /// Returns [`realtime::Error::BadRequest`] when the plate number or the
    /// driver name is blank.
    pub fn validate(&self) -> realtime::Result<()> {
        if self.plate_number.trim().is_empty() {
            return Err(bad_request!("plate number is required"));
        }
        if self.driver_name.trim().is_empty() {
            return Err(bad_request!("driver name is required"));
        }
        Ok(())
    }
}

/// One page of the vehicle list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehiclePage {
    pub results: Vec<Vehicle>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Paging parameters for [`vehicles`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl VehicleQuery {
    #[must_use]
    pub fn to_query(&self) -> String {
        QueryBuilder::new().param("page", self.page).param("limit", self.limit).build()
    }
}

#[derive(Deserialize)]
struct VehicleEnvelope {
    result: Vehicle,
}

/// Fetch a page of vehicles.
///
/// # Errors
///
/// Returns an error when the request fails, the backend does not answer
/// with success, or the response cannot be deserialized.
pub async fn vehicles<P>(query: &VehicleQuery, provider: &P) -> Result<VehiclePage>
where
    P: Config + HttpRequest,
{
    let api_url = Config::get(provider, "API_URL").await.context("getting `API_URL`")?;

    let request = http::Request::builder()
        .method(Method::GET)
        .uri(format!("{api_url}/vehicles{}", query.to_query()))
        .header(CONTENT_TYPE, "application/json")
        .body(Empty::<Bytes>::new())
        .context("building vehicles request")?;

    let response = HttpRequest::fetch(provider, request).await.context("fetching vehicles")?;
    let response = ensure_success(response, "failed to fetch vehicles")?;
    decode(response.body()).context("deserializing vehicles")
}

/// Fetch a single vehicle.
///
/// # Errors
///
/// Returns [`realtime::Error::NotFound`] when the vehicle does not exist, or
/// an error when the request fails or the response cannot be deserialized.
pub async fn vehicle<P>(vehicle_id: &str, provider: &P) -> Result<Vehicle>
where
    P: Config + HttpRequest,
{
    let api_url = Config::get(provider, "API_URL").await.context("getting `API_URL`")?;

    let request = http::Request::builder()
        .method(Method::GET)
        .uri(format!("{api_url}/vehicles/{}", urlencoding::encode(vehicle_id)))
        .header(CONTENT_TYPE, "application/json")
        .body(Empty::<Bytes>::new())
        .context("building vehicle request")?;

    let response = HttpRequest::fetch(provider, request).await.context("fetching vehicle")?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(not_found!("vehicle {vehicle_id} not found").into());
    }
    let response = ensure_success(response, "failed to fetch vehicle")?;

    let envelope: VehicleEnvelope = decode(response.body()).context("deserializing vehicle")?;
    Ok(envelope.result)
}

/// Register a vehicle.
///
/// # Errors
///
/// Returns [`realtime::Error::BadRequest`] for an invalid payload, or an
/// error when the request fails or the response cannot be deserialized.
pub async fn create_vehicle<P>(vehicle: &VehicleCreate, provider: &P) -> Result<Vehicle>
where
    P: Config + HttpRequest,
{
    vehicle.validate()?;
    let api_url = Config::get(provider, "API_URL").await.context("getting `API_URL`")?;

    let body = serde_json::to_vec(vehicle).context("serializing vehicle")?;
    let request = http::Request::builder()
        .method(Method::POST)
        .uri(format!("{api_url}/vehicles"))
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .context("building create vehicle request")?;

    let response = HttpRequest::fetch(provider, request).await.context("creating vehicle")?;
    let response = ensure_success(response, "failed to create vehicle")?;

    let envelope: VehicleEnvelope = decode(response.body()).context("deserializing vehicle")?;
    info!(vehicle_id = %envelope.result.id, "vehicle created");
    Ok(envelope.result)
}

/// Map a non-success status to [`realtime::Error::BadGateway`].
pub(crate) fn ensure_success(
    response: Response<Bytes>, description: &str,
) -> realtime::Result<Response<Bytes>> {
    let status = response.status();
    if !status.is_success() {
        return Err(bad_gateway!("{description}: upstream returned {status}"));
    }
    Ok(response)
}

pub(crate) fn decode<T: DeserializeOwned>(body: &Bytes) -> realtime::Result<T> {
    Ok(serde_json::from_slice(body)?)
}
