//! # Push-stream adapter
//!
//! Wraps a server-push channel that delivers one text-encoded location per
//! message.

use std::sync::Arc;

use futures::StreamExt;
use realtime::{Error, EventSource, PushEvent, RetryPolicy};
use tracing::{debug, info, warn};

use crate::adapter::{ConnectionState, Emission, Phase, StreamAdapter};
use crate::model::{Location, Update};
use crate::retry::NoRetry;

/// Push-stream URL for a vehicle.
#[must_use]
pub fn stream_url(base_url: &str, vehicle_id: &str) -> String {
    format!("{}/locations/vehicle/{vehicle_id}/stream", base_url.trim_end_matches('/'))
}

/// Adapter over an [`EventSource`] channel.
///
/// Malformed messages, and messages whose coordinates are not valid, are
/// dropped without interrupting the stream. Only the most recent valid record
/// is retained.
pub struct PushStreamAdapter<S: EventSource> {
    source: S,
    base_url: String,
    retry: Arc<dyn RetryPolicy>,
    vehicle_id: Option<String>,
    channel: Option<S::Stream>,
    phase: Phase,
    connection: ConnectionState,
    error: Option<Error>,
    latest: Option<Location>,

    /// Failed opens and ended streams since the last successful open.
    attempts: u32,
    exhausted: bool,
}

impl<S: EventSource> PushStreamAdapter<S> {
    pub fn new(source: S, base_url: impl Into<String>) -> Self {
        Self {
            source,
            base_url: base_url.into(),
            retry: Arc::new(NoRetry),
            vehicle_id: None,
            channel: None,
            phase: Phase::Idle,
            connection: ConnectionState::Disconnected,
            error: None,
            latest: None,
            attempts: 0,
            exhausted: false,
        }
    }

    /// Reopen the channel according to `retry` when the transport gives up.
    #[must_use]
    pub fn with_retry(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    /// Most recent valid record received on the current channel.
    #[must_use]
    pub const fn latest(&self) -> Option<&Location> {
        self.latest.as_ref()
    }

    fn reset(&mut self) {
        // dropping the stream closes the channel
        self.channel = None;
        self.connection = ConnectionState::Disconnected;
        self.error = None;
        self.latest = None;
        self.attempts = 0;
        self.exhausted = false;
    }

    async fn open(&mut self, vehicle_id: &str) {
        if self.attempts > 0 {
            let Some(delay) = self.retry.next_delay(self.attempts) else {
                warn!(vehicle_id = %vehicle_id, attempts = self.attempts, "push stream gave up");
                self.phase = Phase::Disconnected;
                self.exhausted = true;
                return;
            };
            tokio::time::sleep(delay).await;
        }
        self.phase = Phase::Connecting;

        // dropping this future mid-open leaves the attempt count untouched
        let url = stream_url(&self.base_url, vehicle_id);
        match self.source.open(&url).await {
            Ok(stream) => self.channel = Some(stream),
            Err(e) => {
                warn!(
                    monotonic_counter.channel_errors = 1,
                    error = %e,
                    url = %url,
                    "opening push stream"
                );
                self.attempts += 1;
                self.phase = Phase::Error;
                self.error = Some(Error::Transport(format!("{e:#}")));
            }
        }
    }
}

impl<S> StreamAdapter for PushStreamAdapter<S>
where
    S: EventSource + 'static,
{
    async fn subscribe(&mut self, vehicle_id: Option<&str>) {
        if self.vehicle_id.as_deref() == vehicle_id {
            return;
        }
        self.reset();
        self.vehicle_id = vehicle_id.map(ToString::to_string);
        self.phase = if self.vehicle_id.is_some() { Phase::Connecting } else { Phase::Idle };
    }

    async fn next(&mut self) -> Option<Emission> {
        loop {
            if self.exhausted {
                return None;
            }
            let vehicle_id = self.vehicle_id.clone()?;

            let Some(channel) = self.channel.as_mut() else {
                self.open(&vehicle_id).await;
                continue;
            };

            let event = channel.next().await;
            match event {
                Some(PushEvent::Open) => {
                    info!(vehicle_id = %vehicle_id, "push stream connected");
                    self.phase = Phase::Connected;
                    self.connection = ConnectionState::Connected;
                    self.error = None;
                    self.attempts = 0;
                    return Some(Emission::Connection(ConnectionState::Connected));
                }
                Some(PushEvent::Message(data)) => match Location::decode(&data) {
                    Ok(location) => {
                        self.latest = Some(location.clone());
                        return Some(Emission::Locations(Update::Single(location)));
                    }
                    Err(e) => {
                        debug!(
                            monotonic_counter.malformed_pushes = 1,
                            error = %e,
                            "dropping push message"
                        );
                    }
                },
                Some(PushEvent::Error(description)) => {
                    warn!(
                        monotonic_counter.channel_errors = 1,
                        vehicle_id = %vehicle_id,
                        error = %description,
                        "push stream error"
                    );
                    self.phase = Phase::Error;
                    self.connection = ConnectionState::Disconnected;
                    self.error = Some(Error::Transport(description));
                    return Some(Emission::Connection(ConnectionState::Disconnected));
                }
                None => {
                    info!(vehicle_id = %vehicle_id, "push stream ended");
                    self.channel = None;
                    self.attempts += 1;
                    self.phase = Phase::Disconnected;
                    self.connection = ConnectionState::Disconnected;
                    return Some(Emission::Connection(ConnectionState::Disconnected));
                }
            }
        }
    }

    async fn close(&mut self) {
        self.reset();
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
