//! # Socket adapter
//!
//! Wraps a bidirectional socket channel. Every newly opened socket joins the
//! vehicle's room before it is used; `location-update` events may carry one
//! record or a batch, and a batch is always handed on as a single unit.

use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use realtime::{Error, RetryPolicy, Socket, SocketChannel, SocketEvent};
use serde_json::json;
use tracing::{debug, info, trace, warn};

use crate::adapter::{ConnectionState, Emission, Phase, StreamAdapter};
use crate::model::{Location, Update};
use crate::retry::NoRetry;

/// Room join request sent after opening a socket.
pub const JOIN_EVENT: &str = "join-vehicle";

/// Inbound event carrying location records.
pub const LOCATION_EVENT: &str = "location-update";

/// Adapter over a [`SocketChannel`].
pub struct SocketAdapter<C: SocketChannel> {
    channel: C,
    url: String,
    retry: Arc<dyn RetryPolicy>,
    vehicle_id: Option<String>,
    socket: Option<C::Socket>,

    /// Whether the held socket has joined the vehicle room.
    joined: bool,
    phase: Phase,
    connection: ConnectionState,
    error: Option<Error>,
    latest: Option<Location>,

    /// Failed opens and ended sockets since the last connect.
    attempts: u32,
    exhausted: bool,
}

impl<C: SocketChannel> SocketAdapter<C> {
    pub fn new(channel: C, url: impl Into<String>) -> Self {
        Self {
            channel,
            url: url.into(),
            retry: Arc::new(NoRetry),
            vehicle_id: None,
            socket: None,
            joined: false,
            phase: Phase::Idle,
            connection: ConnectionState::Disconnected,
            error: None,
            latest: None,
            attempts: 0,
            exhausted: false,
        }
    }

    /// Reconnect according to `retry` when a socket ends.
    #[must_use]
    pub fn with_retry(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    /// Latest record of the most recent `location-update`.
    #[must_use]
    pub const fn latest(&self) -> Option<&Location> {
        self.latest.as_ref()
    }

    async fn teardown(&mut self) {
        if let Some(mut socket) = self.socket.take()
            && let Err(e) = socket.close().await
        {
            warn!(error = %e, "closing socket");
        }
        self.joined = false;
        self.connection = ConnectionState::Disconnected;
        self.error = None;
        self.latest = None;
        self.attempts = 0;
        self.exhausted = false;
    }

    async fn open(&mut self, vehicle_id: &str) {
        if self.attempts > 0 {
            let Some(delay) = self.retry.next_delay(self.attempts) else {
                warn!(vehicle_id = %vehicle_id, attempts = self.attempts, "socket gave up");
                self.phase = Phase::Disconnected;
                self.exhausted = true;
                return;
            };
            tokio::time::sleep(delay).await;
        }
        self.phase = Phase::Connecting;

        let connected = self
            .channel
            .connect(&self.url, &[("vehicleId", vehicle_id)])
            .await
            .context("connecting socket");
        match connected {
            Ok(socket) => {
                self.socket = Some(socket);
                self.joined = false;
            }
            Err(e) => self.fail(vehicle_id, &e),
        }
    }

    // The socket stays held while joining so that teardown can close it.
    async fn join(&mut self, vehicle_id: &str) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        let Err(e) = socket.emit(JOIN_EVENT, json!({ "vehicleId": vehicle_id })).await else {
            self.joined = true;
            return;
        };

        if let Some(mut socket) = self.socket.take()
            && let Err(e) = socket.close().await
        {
            warn!(error = %e, "closing socket");
        }
        self.fail(vehicle_id, &e.context("joining vehicle room"));
    }

    fn fail(&mut self, vehicle_id: &str, e: &anyhow::Error) {
        let description = format!("{e:#}");
        warn!(
            monotonic_counter.channel_errors = 1,
            error = %description,
            vehicle_id = %vehicle_id,
            "opening socket"
        );
        self.attempts += 1;
        self.phase = Phase::Error;
        self.error = Some(Error::Transport(description));
    }
}

impl<C> StreamAdapter for SocketAdapter<C>
where
    C: SocketChannel + 'static,
{
    async fn subscribe(&mut self, vehicle_id: Option<&str>) {
        if self.vehicle_id.as_deref() == vehicle_id {
            return;
        }
        self.teardown().await;
        self.vehicle_id = vehicle_id.map(ToString::to_string);
        self.phase = if self.vehicle_id.is_some() { Phase::Connecting } else { Phase::Idle };
    }

    async fn next(&mut self) -> Option<Emission> {
        loop {
            if self.exhausted {
                return None;
            }
            let vehicle_id = self.vehicle_id.clone()?;

            if self.socket.is_none() {
                self.open(&vehicle_id).await;
                continue;
            }
            if !self.joined {
                self.join(&vehicle_id).await;
                continue;
            }
            let Some(socket) = self.socket.as_mut() else {
                continue;
            };

            let event = socket.next().await;
            match event {
                Some(SocketEvent::Connect) => {
                    info!(vehicle_id = %vehicle_id, "socket connected");
                    self.phase = Phase::Connected;
                    self.connection = ConnectionState::Connected;
                    self.error = None;
                    self.attempts = 0;
                    return Some(Emission::Connection(ConnectionState::Connected));
                }
                Some(SocketEvent::Event { name, payload }) if name == LOCATION_EVENT => {
                    match serde_json::from_value::<Update>(payload) {
                        Ok(update) if update.is_empty() => trace!("empty location batch"),
                        Ok(update) => {
                            self.latest = update.latest().cloned();
                            return Some(Emission::Locations(update));
                        }
                        Err(e) => {
                            debug!(
                                monotonic_counter.malformed_pushes = 1,
                                error = %e,
                                "dropping location update"
                            );
                        }
                    }
                }
                Some(SocketEvent::Event { name, .. }) => {
                    trace!(event = %name, "ignoring socket event");
                }
                Some(SocketEvent::Disconnect(reason)) => {
                    info!(vehicle_id = %vehicle_id, reason = %reason, "socket disconnected");
                    self.phase = Phase::Disconnected;
                    self.connection = ConnectionState::Disconnected;
                    return Some(Emission::Connection(ConnectionState::Disconnected));
                }
                None => {
                    info!(vehicle_id = %vehicle_id, "socket ended");
                    self.socket = None;
                    self.joined = false;
                    self.attempts += 1;
                    self.phase = Phase::Disconnected;
                    self.connection = ConnectionState::Disconnected;
                    return Some(Emission::Connection(ConnectionState::Disconnected));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.teardown().await;
        self.vehicle_id = None;
        self.phase = Phase::Idle;
    }

    fn is_live(&self) -> bool {
        self.vehicle_id.is_some() && !self.exhausted
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn connection(&self) -> ConnectionState {
        self.connection
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
}
