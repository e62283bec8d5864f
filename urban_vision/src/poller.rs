// THEORY:
// The `poller` drives the engine periodically against a live camera. It is the only
// part of the library with a lifecycle: one loop per poller, started and stopped
// under a lock, fetching a snapshot, analysing it off the async executor and handing
// the result to a sink.
//
// Key architectural principles:
// 1.  **Explicit collaborators**: where snapshots come from and where results go are
//     `SnapshotSource` and `AnalysisSink` trait objects injected by the caller. There is
//     no global poller and no global database.
// 2.  **Cooperative stop**: `stop` flips a `watch` flag. The loop observes it before each
//     tick, while sleeping, and once more right before persisting.
// 3.  **No half-written ticks**: a tick either persists one complete record or nothing.
//     A stop that lands mid-tick discards the analysis instead of persisting it, and a
//     persist that has started is never interrupted.
// 4.  **Fixed cadence**: the sleep between ticks is `sample_period - elapsed`, floored
//     at `min_delay` so a slow tick can never turn the loop into a busy spin. The
//     floor itself is never below `MIN_DELAY_FLOOR`.

use crate::core_modules::frame::{FrameError, OwnedFrame};
use crate::pipeline::{AnalysisComponents, AnalysisOptions, SceneAnalyzer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Floor on the delay between two ticks.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(2000);
/// Smallest `min_delay` a poller accepts. A zero floor would let the loop spin.
pub const MIN_DELAY_FLOOR: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no snapshot available: {0}")]
    Unavailable(String),
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot could not be decoded: {0}")]
    Decode(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write record: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("analysis task failed: {0}")]
    Analysis(#[from] tokio::task::JoinError),
}

/// One decoded frame from a camera, with the capture hour if the source knows it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame: OwnedFrame,
    pub hour_of_day: Option<u8>,
}

/// A persisted analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub tick: u64,
    /// Wall-clock time the record was produced, in Unix milliseconds.
    pub produced_at_ms: u64,
    pub processing_ms: u64,
    pub components: AnalysisComponents,
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, SourceError>;
}

#[async_trait]
pub trait AnalysisSink: Send + Sync {
    async fn persist(&self, record: AnalysisRecord) -> Result<(), SinkError>;
}

/// Keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<AnalysisRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AnalysisRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AnalysisSink for MemorySink {
    async fn persist(&self, record: AnalysisRecord) -> Result<(), SinkError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub sample_period: Duration,
    pub min_delay: Duration,
    pub options: AnalysisOptions,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            sample_period: DEFAULT_SAMPLE_PERIOD,
            min_delay: DEFAULT_MIN_DELAY,
            options: AnalysisOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerStatus {
    pub running: bool,
    pub ticks_completed: u64,
    pub last_people_estimate: Option<u32>,
    pub last_vehicle_count: Option<u32>,
    /// Unix milliseconds of the last persisted record.
    pub last_updated_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl PollerConfig {
    /// Raises `min_delay` to at least `MIN_DELAY_FLOOR`.
    pub fn normalized(self) -> Self {
        Self {
            min_delay: self.min_delay.max(MIN_DELAY_FLOOR),
            ..self
        }
    }
}

/// `max(sample_period - elapsed, min_delay)`.
pub fn next_delay(sample_period: Duration, elapsed: Duration, min_delay: Duration) -> Duration {
    sample_period.saturating_sub(elapsed).max(min_delay)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct RunningLoop {
    stop_sender: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
struct LoopContext {
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn AnalysisSink>,
    analyzer: Arc<SceneAnalyzer>,
    config: PollerConfig,
    status: Arc<watch::Sender<PollerStatus>>,
}

enum TickOutcome {
    Persisted(AnalysisRecord),
    Discarded,
}

impl LoopContext {
    async fn run_tick(&self, tick: u64, stop: &watch::Receiver<bool>) -> Result<TickOutcome, PollerError> {
        let started = Instant::now();
        let snapshot = self.source.fetch().await?;

        let analyzer = Arc::clone(&self.analyzer);
        let options = AnalysisOptions {
            hour_of_day: snapshot.hour_of_day.or(self.config.options.hour_of_day),
            ..self.config.options
        };
        let components =
            tokio::task::spawn_blocking(move || analyzer.analyze(&snapshot.frame.view(), &options)).await?;

        if *stop.borrow() {
            return Ok(TickOutcome::Discarded);
        }

        let record = AnalysisRecord {
            tick,
            produced_at_ms: unix_millis(),
            processing_ms: started.elapsed().as_millis() as u64,
            components,
        };
        self.sink.persist(record.clone()).await?;
        Ok(TickOutcome::Persisted(record))
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        info!(period_ms = self.config.sample_period.as_millis() as u64, "camera polling started");
        let mut tick = 0;
        loop {
            if *stop.borrow() {
                break;
            }
            let started = Instant::now();
            tick += 1;

            match self.run_tick(tick, &stop).await {
                Ok(TickOutcome::Persisted(record)) => {
                    debug!(tick, people = record.components.summary.people_count, "tick persisted");
                    self.status.send_modify(|status| {
                        status.ticks_completed += 1;
                        status.last_people_estimate = Some(record.components.summary.people_count);
                        status.last_vehicle_count = Some(record.components.summary.vehicle_count);
                        status.last_updated_ms = Some(record.produced_at_ms);
                        status.last_error = None;
                    });
                }
                Ok(TickOutcome::Discarded) => {
                    debug!(tick, "stop requested mid-tick, result discarded");
                    break;
                }
                Err(err) => {
                    warn!(tick, error = %err, "polling tick failed");
                    self.status.send_modify(|status| status.last_error = Some(err.to_string()));
                }
            }

            let delay = next_delay(self.config.sample_period, started.elapsed(), self.config.min_delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(ticks = tick, "camera polling loop ended");
    }
}

/// Periodically analyses snapshots from one source. At most one loop runs at a time.
pub struct CameraPoller {
    context: LoopContext,
    running: Mutex<Option<RunningLoop>>,
}

impl CameraPoller {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn AnalysisSink>,
        analyzer: Arc<SceneAnalyzer>,
        config: PollerConfig,
    ) -> Self {
        let (status, _) = watch::channel(PollerStatus::default());
        let config = config.normalized();
        Self {
            context: LoopContext {
                source,
                sink,
                analyzer,
                config,
                status: Arc::new(status),
            },
            running: Mutex::new(None),
        }
    }

    /// Starts the loop. Returns `false` if it is already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|active| !active.handle.is_finished()) {
            return false;
        }

        let (stop_sender, stop_receiver) = watch::channel(false);
        let handle = tokio::spawn(self.context.clone().run(stop_receiver));
        *running = Some(RunningLoop { stop_sender, handle });
        self.context.status.send_modify(|status| status.running = true);
        true
    }

    /// Stops the loop and waits for it to exit. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(active) = running.take() else {
            return false;
        };
        // The loop may already have exited on its own; the flag is moot then.
        let _ = active.stop_sender.send(true);
        if let Err(err) = active.handle.await {
            warn!(error = %err, "camera polling task ended abnormally");
        }
        self.context.status.send_modify(|status| status.running = false);
        info!("camera polling stopped");
        true
    }

    pub fn config(&self) -> &PollerConfig {
        &self.context.config
    }

    pub fn status(&self) -> PollerStatus {
        self.context.status.borrow().clone()
    }

    /// A receiver that is notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<PollerStatus> {
        self.context.status.subscribe()
    }
}
