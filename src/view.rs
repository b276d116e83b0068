//! # Views
//!
//! The dashboard surface: vehicle list requests and the vehicle detail view,
//! which mounts a track controller on the configured live channel.

use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_api::{
    HistoryCache, LocationCreate, LocationsApi, Vehicle, VehicleCreate, VehiclePage, VehicleQuery,
};
use live_track::{
    HistorySource, Location, PushStreamAdapter, SocketAdapter, TrackController, TrackHandle,
    TrackSnapshot,
};
use realtime::{EventSource, HttpRequest, RetryPolicy, SocketChannel};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::config::{Config, LiveTransport};
use crate::render::{MapLayer, MapView};

/// Live channel factories supplied by the host. Only the one selected by
/// [`Config::transport`] is used.
#[derive(Debug, Clone)]
pub struct Transports<S, C> {
    pub events: S,
    pub sockets: C,
}

/// What the detail view shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "map")]
pub enum DetailState {
    /// Mounted without a vehicle id.
    InvalidVehicleId,
    Track(MapView),
}

/// Requests against the fleet backend, sharing one history cache with every
/// detail view it opens.
pub struct Dashboard<P> {
    provider: Arc<P>,
    config: Config,
    locations: LocationsApi<P>,
}

impl<P> Dashboard<P>
where
    P: realtime::Config + HttpRequest + 'static,
{
    #[must_use]
    pub fn new(provider: Arc<P>, config: Config) -> Self {
        let cache = HistoryCache::new(config.history_stale_after);
        let locations = LocationsApi::new(Arc::clone(&provider), cache);
        Self { provider, config, locations }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// # Errors
    ///
    /// Returns an error when the vehicle list cannot be fetched.
    pub async fn vehicles(&self, query: &VehicleQuery) -> Result<VehiclePage> {
        fleet_api::vehicles(query, self.provider.as_ref()).await
    }

    /// # Errors
    ///
    /// Returns an error when the vehicle does not exist or cannot be fetched.
    pub async fn vehicle(&self, vehicle_id: &str) -> Result<Vehicle> {
        fleet_api::vehicle(vehicle_id, self.provider.as_ref()).await
    }

    /// # Errors
    ///
    /// Returns an error when the vehicle is invalid or cannot be created.
    pub async fn create_vehicle(&self, vehicle: &VehicleCreate) -> Result<Vehicle> {
        fleet_api::create_vehicle(vehicle, self.provider.as_ref()).await
    }

    /// Record a location. Open detail views pick it up on their next
    /// [`DetailView::refresh`].
    ///
    /// # Errors
    ///
    /// Returns an error when the location is invalid or cannot be recorded.
    pub async fn create_location(&self, location: &LocationCreate) -> Result<Location> {
        self.locations.create_location(location).await
    }

    /// Mount a detail view for `vehicle_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the track controller cannot be started.
    pub async fn open_detail<S, C>(
        &self, transports: Transports<S, C>, vehicle_id: Option<&str>,
    ) -> Result<DetailView>
    where
        S: EventSource + 'static,
        C: SocketChannel + 'static,
    {
        DetailView::mount(&self.config, transports, self.locations.clone(), vehicle_id).await
    }
}

/// A mounted vehicle detail view. Owns one track controller for its
/// lifetime.
#[derive(Debug)]
pub struct DetailView {
    vehicle_id: Option<String>,
    transport: LiveTransport,
    layer: MapLayer,
    handle: TrackHandle,
}

impl DetailView {
    /// Start a controller on the configured channel and select `vehicle_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the controller stops before accepting the
    /// vehicle.
    pub async fn mount<S, C, H>(
        config: &Config, transports: Transports<S, C>, history: H, vehicle_id: Option<&str>,
    ) -> Result<Self>
    where
        S: EventSource + 'static,
        C: SocketChannel + 'static,
        H: HistorySource,
    {
        let retry: Arc<dyn RetryPolicy> = Arc::new(config.reconnect);
        let handle = match config.transport {
            LiveTransport::PushStream => {
                let adapter = PushStreamAdapter::new(transports.events, config.api_url.clone())
                    .with_retry(retry);
                TrackController::spawn(adapter, history)
            }
            LiveTransport::Socket => {
                let adapter =
                    SocketAdapter::new(transports.sockets, config.ws_url.clone()).with_retry(retry);
                TrackController::spawn(adapter, history)
            }
        };

        let mut view = Self {
            vehicle_id: None,
            transport: config.transport,
            layer: MapLayer::new(config.timezone),
            handle,
        };
        view.navigate(vehicle_id).await.context("mounting detail view")?;
        info!(vehicle_id = ?vehicle_id, transport = ?config.transport, "detail view mounted");
        Ok(view)
    }

    /// Re-target the view at another vehicle.
    ///
    /// # Errors
    ///
    /// Returns an error when the controller has stopped.
    pub async fn navigate(&mut self, vehicle_id: Option<&str>) -> Result<()> {
        let vehicle_id = vehicle_id.map(str::trim).filter(|id| !id.is_empty());
        self.handle.select(vehicle_id.map(ToString::to_string)).await?;
        self.vehicle_id = vehicle_id.map(ToString::to_string);
        Ok(())
    }

    /// Refetch the history and merge it into the track.
    ///
    /// # Errors
    ///
    /// Returns an error when the controller has stopped.
    pub async fn refresh(&self) -> Result<()> {
        self.handle.refresh().await
    }

    #[must_use]
    pub fn vehicle_id(&self) -> Option<&str> {
        self.vehicle_id.as_deref()
    }

    #[must_use]
    pub const fn transport(&self) -> LiveTransport {
        self.transport
    }

    #[must_use]
    pub fn snapshot(&self) -> TrackSnapshot {
        self.handle.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackSnapshot> {
        self.handle.subscribe()
    }

    /// Current view state.
    #[must_use]
    pub fn render(&self) -> DetailState {
        if self.vehicle_id.is_none() {
            return DetailState::InvalidVehicleId;
        }
        DetailState::Track(self.layer.project(&self.handle.snapshot()))
    }

    #[must_use]
    pub const fn layer(&self) -> &MapLayer {
        &self.layer
    }

    /// Close the live channel and discard the track.
    ///
    /// # Errors
    ///
    /// Returns an error when the controller task failed.
    pub async fn unmount(self) -> Result<()> {
        info!(vehicle_id = ?self.vehicle_id, "detail view unmounted");
        self.handle.unmount().await
    }
}
