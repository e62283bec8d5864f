mod common;

use async_trait::async_trait;
use common::{street_scene, vehicle_patches};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;
use urban_vision::{
    AnalysisOptions, CameraPoller, MemorySink, OwnedFrame, PollerConfig, SceneAnalyzer, Snapshot, SnapshotSource,
    SourceError,
};

struct StaticSource {
    frame: OwnedFrame,
    fetches: AtomicU32,
}

impl StaticSource {
    fn street() -> Self {
        Self {
            frame: OwnedFrame::from_rgb_image(street_scene(640, 480, &vehicle_patches(3))),
            fetches: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SnapshotSource for StaticSource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Snapshot {
            frame: self.frame.clone(),
            hour_of_day: Some(12),
        })
    }
}

struct FailingSource;

#[async_trait]
impl SnapshotSource for FailingSource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        Err(SourceError::Unavailable("camera offline".into()))
    }
}

/// Signals when a fetch begins, then takes its time.
struct SlowSource {
    inner: StaticSource,
    fetch_started: Arc<Notify>,
    latency: Duration,
}

#[async_trait]
impl SnapshotSource for SlowSource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        self.fetch_started.notify_one();
        tokio::time::sleep(self.latency).await;
        self.inner.fetch().await
    }
}

fn fast_config() -> PollerConfig {
    PollerConfig {
        sample_period: Duration::from_millis(20),
        min_delay: Duration::from_millis(5),
        options: AnalysisOptions::default(),
    }
}

fn poller(source: Arc<dyn SnapshotSource>, sink: &MemorySink) -> CameraPoller {
    CameraPoller::new(source, Arc::new(sink.clone()), Arc::new(SceneAnalyzer::default()), fast_config())
}

#[tokio::test]
async fn persists_one_record_per_completed_tick() {
    let sink = MemorySink::new();
    let poller = poller(Arc::new(StaticSource::street()), &sink);
    let mut status = poller.subscribe();

    assert!(poller.start().await);
    assert!(poller.status().running);
    timeout(Duration::from_secs(10), status.wait_for(|s| s.ticks_completed >= 2))
        .await
        .expect("poller did not tick in time")
        .unwrap();
    assert!(poller.stop().await);

    let final_status = poller.status();
    assert!(!final_status.running);
    let records = sink.records().await;
    assert_eq!(records.len() as u64, final_status.ticks_completed);
    assert_eq!(final_status.last_vehicle_count, Some(records.last().unwrap().components.summary.vehicle_count));
    assert!(final_status.last_people_estimate.is_some());
    assert!(final_status.last_updated_ms.is_some());
    assert!(final_status.last_error.is_none());

    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.tick, i as u64 + 1);
        assert!(record.components.is_traffic_scene());
        assert_eq!(record.components.vehicles.as_ref().unwrap().detected_blobs, 3);
    }
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let sink = MemorySink::new();
    let poller = poller(Arc::new(StaticSource::street()), &sink);

    assert!(!poller.stop().await);
    assert!(poller.start().await);
    assert!(!poller.start().await);
    assert!(poller.stop().await);
    assert!(!poller.stop().await);
    assert!(!poller.status().running);

    // A stopped poller can be started again.
    assert!(poller.start().await);
    assert!(poller.stop().await);
}

#[tokio::test]
async fn source_errors_are_reported_not_persisted() {
    let sink = MemorySink::new();
    let poller = poller(Arc::new(FailingSource), &sink);
    let mut status = poller.subscribe();

    assert!(poller.start().await);
    timeout(Duration::from_secs(10), status.wait_for(|s| s.last_error.is_some()))
        .await
        .expect("error was never reported")
        .unwrap();
    assert!(poller.stop().await);

    let final_status = poller.status();
    assert_eq!(final_status.ticks_completed, 0);
    assert!(final_status.last_error.unwrap().contains("camera offline"));
    assert!(sink.records().await.is_empty());
}

#[tokio::test]
async fn stop_during_a_tick_discards_its_result() {
    let sink = MemorySink::new();
    let fetch_started = Arc::new(Notify::new());
    let source = SlowSource {
        inner: StaticSource::street(),
        fetch_started: Arc::clone(&fetch_started),
        latency: Duration::from_millis(300),
    };
    let poller = poller(Arc::new(source), &sink);

    assert!(poller.start().await);
    timeout(Duration::from_secs(10), fetch_started.notified())
        .await
        .expect("fetch never started");
    assert!(poller.stop().await);

    assert!(sink.records().await.is_empty());
    assert_eq!(poller.status().ticks_completed, 0);
}
