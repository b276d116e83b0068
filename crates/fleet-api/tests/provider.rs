#![allow(missing_docs)]
#![allow(dead_code)]

use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use fleet_api::{LocationCreate, Vehicle, VehicleCreate, VehiclePage};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use live_track::{Coordinate, Location};
use realtime::{Config, HttpRequest};
use serde_json::json;

pub const API_URL: &str = "http://fleet.test/api";

#[must_use]
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_740_000_000 + secs, 0).single().expect("valid timestamp")
}

#[must_use]
pub fn vehicle(id: &str, plate_number: &str) -> Vehicle {
    Vehicle {
        id: id.to_string(),
        plate_number: plate_number.to_string(),
        driver_name: "Deniz Kaya".to_string(),
        is_active: true,
        created_at: at(0),
    }
}

#[must_use]
pub fn location(id: &str, vehicle_id: &str, secs: i64) -> Location {
    Location {
        id: id.to_string(),
        vehicle_id: vehicle_id.to_string(),
        latitude: Coordinate::from(41.0082),
        longitude: Coordinate::from(28.9784),
        speed: 25.0,
        timestamp: at(secs),
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub body: Bytes,
}

#[derive(Clone, Default)]
pub struct MockProvider {
    vehicles: Arc<Mutex<Vec<Vehicle>>>,
    locations: Arc<Mutex<HashMap<String, Vec<Location>>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    status: Arc<Mutex<Option<StatusCode>>>,
}

impl MockProvider {
    #[must_use]
    pub fn with_vehicles(self, vehicles: Vec<Vehicle>) -> Self {
        *self.vehicles.lock().expect("should lock") = vehicles;
        self
    }

    /// Recorded locations, in any order. The backend answers newest first.
    #[must_use]
    pub fn with_locations(self, vehicle_id: &str, records: Vec<Location>) -> Self {
        self.locations.lock().expect("should lock").insert(vehicle_id.to_string(), records);
        self
    }

    /// Answer every request with `status`.
    pub fn fail_with(&self, status: StatusCode) {
        *self.status.lock().expect("should lock") = Some(status);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("should lock").clone()
    }

    fn respond(
        &self, method: &Method, path: &str, query: &str, body: &[u8],
    ) -> Result<(StatusCode, Vec<u8>)> {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let (status, value) = match (method.clone(), segments.as_slice()) {
            (Method::GET, ["api", "vehicles"]) => {
                let params = parse_query(query);
                let page = params.get("page").and_then(|p| p.parse::<u32>().ok()).unwrap_or(1);
                let limit = params.get("limit").and_then(|l| l.parse::<u32>().ok()).unwrap_or(10);
                let vehicles = self.vehicles.lock().map_err(|e| anyhow!("{e}"))?;
                let results = vehicles
                    .iter()
                    .skip(((page.max(1) - 1) * limit) as usize)
                    .take(limit as usize)
                    .cloned()
                    .collect();
                let page = VehiclePage { results, total: vehicles.len() as u64, page, limit };
                (StatusCode::OK, serde_json::to_value(page)?)
            }
            (Method::GET, ["api", "vehicles", id]) => {
                let vehicles = self.vehicles.lock().map_err(|e| anyhow!("{e}"))?;
                match vehicles.iter().find(|v| v.id == *id) {
                    Some(vehicle) => (StatusCode::OK, json!({ "result": vehicle })),
                    None => (StatusCode::NOT_FOUND, json!({ "message": "vehicle not found" })),
                }
            }
            (Method::GET, ["api", "vehicles", id, "locations"]) => {
                let vehicles = self.vehicles.lock().map_err(|e| anyhow!("{e}"))?;
                let known = vehicles.iter().any(|v| v.id == *id);
                drop(vehicles);
                let locations = self.locations.lock().map_err(|e| anyhow!("{e}"))?;
                match locations.get(*id) {
                    Some(records) => {
                        let mut records = records.clone();
                        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                        (StatusCode::OK, json!({ "results": records }))
                    }
                    None if known => (StatusCode::OK, json!({ "results": [] })),
                    None => (StatusCode::NOT_FOUND, json!({ "message": "vehicle not found" })),
                }
            }
            (Method::POST, ["api", "vehicles"]) => {
                let create: VehicleCreate =
                    serde_json::from_slice(body).context("decoding vehicle")?;
                let mut vehicles = self.vehicles.lock().map_err(|e| anyhow!("{e}"))?;
                let created = Vehicle {
                    id: format!("veh-{}", vehicles.len() + 1),
                    plate_number: create.plate_number,
                    driver_name: create.driver_name,
                    is_active: create.is_active,
                    created_at: at(100),
                };
                vehicles.push(created.clone());
                (StatusCode::CREATED, json!({ "result": created }))
            }
            (Method::POST, ["api", "locations"]) => {
                let create: LocationCreate =
                    serde_json::from_slice(body).context("decoding location")?;
                let mut locations = self.locations.lock().map_err(|e| anyhow!("{e}"))?;
                let records = locations.entry(create.vehicle_id.clone()).or_default();
                let created = Location {
                    id: format!("loc-new-{}", records.len() + 1),
                    vehicle_id: create.vehicle_id,
                    latitude: create.latitude,
                    longitude: create.longitude,
                    speed: create.speed,
                    timestamp: at(1_000),
                };
                records.push(created.clone());
                (StatusCode::CREATED, serde_json::to_value(created)?)
            }
            _ => return Err(anyhow!("unknown path: {method} {path}")),
        };

        Ok((status, serde_json::to_vec(&value)?))
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Config for MockProvider {
    async fn get(&self, key: &str) -> Result<String> {
        match key {
            "API_URL" => Ok(API_URL.to_string()),
            _ => Err(anyhow!("unknown config key: {key}")),
        }
    }
}

impl HttpRequest for MockProvider {
    async fn fetch<T>(&self, request: Request<T>) -> Result<Response<Bytes>>
    where
        T: http_body::Body + Any + Send,
        T::Data: Into<Vec<u8>>,
        T::Error: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        let full = (request.body() as &dyn Any).downcast_ref::<Full<Bytes>>().cloned();
        let body = match full {
            Some(full) => full.collect().await.map(|c| c.to_bytes()).unwrap_or_default(),
            None => Bytes::new(),
        };

        let method = request.method().clone();
        let uri = request.uri().to_string();
        let path = request.uri().path().to_string();
        let query = request.uri().query().unwrap_or_default().to_string();
        self.requests.lock().map_err(|e| anyhow!("{e}"))?.push(Recorded {
            method: method.clone(),
            uri,
            body: body.clone(),
        });

        let forced = *self.status.lock().map_err(|e| anyhow!("{e}"))?;
        let (status, data) = match forced {
            Some(status) => (status, b"{}".to_vec()),
            None => self.respond(&method, &path, &query, &body)?,
        };

        Response::builder()
            .status(status)
            .body(Bytes::from(data))
            .context("failed to build response")
    }
}
