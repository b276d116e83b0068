//! # Stream Adapters
//!
//! Common surface of the live delivery channels consumed by the
//! [`TrackController`](crate::TrackController).

use realtime::Error;
use serde::Serialize;

use crate::model::Update;

/// Whether a live channel is currently established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Adapter lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// No vehicle subscribed.
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
    /// The channel reported an error and is left to the transport to recover.
    Error,
}

/// Something an adapter wants the controller to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// Records to reconcile into the track as one unit.
    Locations(Update),

    /// The connection flag changed.
    Connection(ConnectionState),
}

/// A live channel bound to at most one vehicle at a time.
///
/// Implementations open their channel lazily from [`StreamAdapter::next`].
/// `next` must be cancel-safe: a controller drops a pending `next` whenever
/// another event wins, and the following call resumes without counting the
/// interrupted open as a failed attempt or leaking a half-open channel.
pub trait StreamAdapter: Send + 'static {
    /// Bind to `vehicle_id`, closing any channel held for a previous vehicle.
    /// `None` returns the adapter to [`Phase::Idle`].
    fn subscribe(&mut self, vehicle_id: Option<&str>) -> impl Future<Output = ()> + Send;

    /// Wait for the next emission. Returns `None` once the adapter is idle or
    /// the retry policy has given up.
    fn next(&mut self) -> impl Future<Output = Option<Emission>> + Send;

    /// Close the channel and return to [`Phase::Idle`].
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Whether [`StreamAdapter::next`] can still produce emissions.
    fn is_live(&self) -> bool;

    fn phase(&self) -> Phase;

    fn connection(&self) -> ConnectionState;

    /// Last channel error, cleared on connect.
    fn error(&self) -> Option<&Error>;
}
