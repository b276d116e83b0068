//! # Track Controller
//!
//! Binds one vehicle to one authoritative [`Track`]. The controller runs as a
//! single task that owns the track, the stream adapter and any pending history
//! fetch, so every mutation happens in one place and merges never race.
//! Readers observe immutable [`TrackSnapshot`]s through a watch channel.

use std::sync::Arc;

use anyhow::anyhow;
use realtime::Error;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::{ConnectionState, Emission, StreamAdapter};
use crate::model::Location;
use crate::reconcile::Track;

const COMMAND_BUFFER: usize = 16;

/// Source of historical location batches.
///
/// Implementations may return records in any order; the controller only
/// relies on reconciliation for ordering.
pub trait HistorySource: Clone + Send + Sync + 'static {
    /// Fetch the recorded locations for `vehicle_id`.
    fn history(
        &self, vehicle_id: &str,
    ) -> impl Future<Output = anyhow::Result<Vec<Location>>> + Send;
}

/// Progress of the historical batch that seeds the track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "error")]
pub enum HistoryStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Everything the rendering layer needs, captured at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSnapshot {
    pub vehicle_id: Option<String>,
    pub track: Arc<Track>,

    /// The most recently reconciled live record.
    pub latest: Option<Location>,
    pub connection: ConnectionState,
    pub history: HistoryStatus,

    /// Last channel error reported by the adapter.
    pub error: Option<String>,
}

#[derive(Debug)]
enum Command {
    Select(Option<String>),
    Refresh,
    Shutdown,
}

struct Fetched {
    epoch: u64,
    vehicle_id: String,
    result: anyhow::Result<Vec<Location>>,
}

/// Handle to a running controller, held by the view that mounted it.
#[derive(Debug)]
pub struct TrackHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<TrackSnapshot>,
    task: JoinHandle<()>,
}

impl TrackHandle {
    /// Switch to `vehicle_id`, discarding all state held for the previous
    /// vehicle. `None` unbinds the controller.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn select(&self, vehicle_id: Option<String>) -> anyhow::Result<()> {
        self.send(Command::Select(vehicle_id)).await
    }

    /// Fetch the history again and merge it into the current track.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn refresh(&self) -> anyhow::Result<()> {
        self.send(Command::Refresh).await
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> TrackSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the controller, closing its channel and discarding its track.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller task panicked.
    pub async fn unmount(self) -> anyhow::Result<()> {
        // the task may already have stopped; joining below covers both cases
        let _ = self.commands.send(Command::Shutdown).await;
        self.task.await.map_err(|e| anyhow!("track controller failed: {e}"))
    }

    async fn send(&self, command: Command) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|e| Error::Internal(format!("track controller stopped: {e}")).into())
    }
}

/// Owner of one vehicle's track.
pub struct TrackController<A, H> {
    adapter: A,
    history: H,
    vehicle_id: Option<String>,
    track: Arc<Track>,
    latest: Option<Location>,
    status: HistoryStatus,
    epoch: u64,
    pending: Option<JoinHandle<()>>,
    fetched: mpsc::UnboundedSender<Fetched>,
    snapshots: watch::Sender<TrackSnapshot>,
}

impl<A, H> TrackController<A, H>
where
    A: StreamAdapter,
    H: HistorySource,
{
    /// Start a controller task with no vehicle selected.
    #[must_use]
    pub fn spawn(adapter: A, history: H) -> TrackHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (fetched_tx, fetched_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(TrackSnapshot::default());

        let controller = Self {
            adapter,
            history,
            vehicle_id: None,
            track: Arc::new(Track::new()),
            latest: None,
            status: HistoryStatus::Idle,
            epoch: 0,
            pending: None,
            fetched: fetched_tx,
            snapshots: snapshot_tx,
        };
        let task = tokio::spawn(controller.run(command_rx, fetched_rx));

        TrackHandle { commands: command_tx, snapshots: snapshot_rx, task }
    }

    async fn run(
        mut self, mut commands: mpsc::Receiver<Command>,
        mut fetched: mpsc::UnboundedReceiver<Fetched>,
    ) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Select(vehicle_id)) => self.select(vehicle_id).await,
                    Some(Command::Refresh) => {
                        self.fetch_history();
                        self.publish();
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(batch) = fetched.recv() => self.seed(batch),
                emission = self.adapter.next(), if self.adapter.is_live() => match emission {
                    Some(emission) => self.apply(emission),
                    // gave up; surface the channel error
                    None => self.publish(),
                },
            }
        }

        self.discard().await;
        self.adapter.close().await;
        self.publish();
        debug!("track controller stopped");
    }

    async fn select(&mut self, vehicle_id: Option<String>) {
        if vehicle_id == self.vehicle_id {
            return;
        }
        info!(from = ?self.vehicle_id, to = ?vehicle_id, "selecting vehicle");

        self.discard().await;
        self.vehicle_id = vehicle_id;
        self.adapter.subscribe(self.vehicle_id.as_deref()).await;
        self.fetch_history();
        self.publish();
    }

    // Drop everything held for the current vehicle.
    async fn discard(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.epoch += 1;
        self.adapter.subscribe(None).await;
        self.vehicle_id = None;
        self.track = Arc::new(Track::new());
        self.latest = None;
        self.status = HistoryStatus::Idle;
    }

    fn fetch_history(&mut self) {
        let Some(vehicle_id) = self.vehicle_id.clone() else {
            return;
        };
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.epoch += 1;
        self.status = HistoryStatus::Loading;

        let epoch = self.epoch;
        let history = self.history.clone();
        let fetched = self.fetched.clone();

        self.pending = Some(tokio::spawn(async move {
            let result = history.history(&vehicle_id).await;
            // the controller may have stopped
            let _ = fetched.send(Fetched { epoch, vehicle_id, result });
        }));
    }

    fn seed(&mut self, batch: Fetched) {
        let current = self.vehicle_id.as_deref() == Some(batch.vehicle_id.as_str());
        if batch.epoch != self.epoch || !current {
            warn!(
                monotonic_counter.stale_history_discarded = 1,
                vehicle_id = %batch.vehicle_id,
                "discarding superseded history"
            );
            return;
        }
        self.pending = None;

        match batch.result {
            Ok(records) => {
                let count = records.len();
                self.track = Arc::new(self.track.reconcile(records));
                self.status = HistoryStatus::Loaded;
                info!(
                    monotonic_counter.locations_reconciled = count as u64,
                    vehicle_id = %batch.vehicle_id,
                    track_len = self.track.len(),
                    "seeded track"
                );
            }
            Err(e) => {
                let description = format!("{e:#}");
                warn!(vehicle_id = %batch.vehicle_id, error = %description, "fetching history");
                self.status = HistoryStatus::Failed(description);
            }
        }
        self.publish();
    }

    fn apply(&mut self, emission: Emission) {
        match emission {
            Emission::Locations(update) => {
                let count = update.len();
                if let Some(latest) = update.latest() {
                    self.latest = Some(latest.clone());
                }
                self.track = Arc::new(self.track.reconcile(update));
                debug!(
                    monotonic_counter.locations_reconciled = count as u64,
                    vehicle_id = ?self.vehicle_id,
                    track_len = self.track.len(),
                    "reconciled live update"
                );
            }
            Emission::Connection(state) => {
                debug!(vehicle_id = ?self.vehicle_id, state = ?state, "connection changed");
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(TrackSnapshot {
            vehicle_id: self.vehicle_id.clone(),
            track: Arc::clone(&self.track),
            latest: self.latest.clone(),
            connection: self.adapter.connection(),
            history: self.status.clone(),
            error: self.adapter.error().map(ToString::to_string),
        });
    }
}
