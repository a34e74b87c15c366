//! Desired-state delivery
//!
//! The reconciler runs on one dedicated thread and consumes events from a
//! queue, so cycles for a sensor never overlap. A polling task watches the
//! desired-state file and enqueues a new versioned event whenever its parsed
//! contents change.

use ocular_channel::Channel;
use ocular_core::DesiredConfig;
use ocular_reconfigure::{ReconcileReport, Reconfigure, ReconfigureError};
use std::path::PathBuf;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::parse_desired;

/// Depth of the desired-state queue
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// A desired state tagged with a monotonically increasing version
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredStateEvent {
    pub version: u64,
    pub desired: DesiredConfig,
}

/// Outcome of one delivered event
#[derive(Debug)]
pub struct CycleResult {
    pub version: u64,
    pub result: Result<ReconcileReport, ReconfigureError>,
}

/// Spawn the reconcile thread
///
/// The thread exits when every event sender is dropped and hands the
/// reconciler back through the join handle.
pub fn spawn_reconciler<C>(
    mut reconfigure: Reconfigure<C>,
    mut events: mpsc::Receiver<DesiredStateEvent>,
    results: Option<mpsc::UnboundedSender<CycleResult>>,
) -> std::io::Result<JoinHandle<Reconfigure<C>>>
where
    C: Channel + Send + 'static,
{
    std::thread::Builder::new()
        .name("reconcile".to_string())
        .spawn(move || {
            while let Some(event) = events.blocking_recv() {
                let result = reconfigure.reconcile(&event.desired);
                log_cycle(event.version, &result);

                if let Some(results) = &results {
                    let _ = results.send(CycleResult {
                        version: event.version,
                        result,
                    });
                }
            }
            debug!("Desired-state queue closed, reconcile thread exiting");
            reconfigure
        })
}

fn log_cycle(version: u64, result: &Result<ReconcileReport, ReconfigureError>) {
    match result {
        Ok(report) if report.is_clean() => {
            info!(version, resolution = ?report.resolution, "Applied desired state");
        }
        Ok(report) => {
            warn!(
                version,
                issues = report.issues.len(),
                "Applied desired state with issues"
            );
            for issue in &report.issues {
                warn!(version, kind = issue.kind(), "{}", issue);
            }
        }
        Err(e) => {
            error!(version, error = %e, "Reconciliation aborted");
        }
    }
}

/// Poll the desired-state file and enqueue changed contents
///
/// Unreadable or malformed files are logged and skipped; the last good state
/// stays in effect. Returns when the queue is closed.
pub async fn watch_desired(
    path: PathBuf,
    poll_interval: Duration,
    events: mpsc::Sender<DesiredStateEvent>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last: Option<DesiredConfig> = None;
    let mut version = 0u64;
    let mut last_error: Option<String> = None;

    info!(path = %path.display(), "Watching desired state");

    loop {
        ticker.tick().await;
        if events.is_closed() {
            debug!("Desired-state queue closed, watcher exiting");
            return;
        }

        let parsed = match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_desired(&path, &content).map_err(|e| e.to_string()),
            Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
        };

        let desired = match parsed {
            Ok(desired) => {
                last_error = None;
                desired
            }
            Err(message) => {
                // Only log each distinct failure once
                if last_error.as_deref() != Some(message.as_str()) {
                    warn!(error = %message, "Ignoring desired state");
                    last_error = Some(message);
                }
                continue;
            }
        };

        if last.as_ref() == Some(&desired) {
            continue;
        }

        version += 1;
        debug!(version, "Desired state changed");

        let event = DesiredStateEvent {
            version,
            desired: desired.clone(),
        };
        if events.send(event).await.is_err() {
            debug!("Desired-state queue closed, watcher exiting");
            return;
        }
        last = Some(desired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocular_channel::{Operation, SensorProfile, SimulatedChannel};
    use ocular_core::{DesiredImu, Resolution};
    use ocular_reconfigure::ResolutionOutcome;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn desired(resolution: &str) -> DesiredConfig {
        DesiredConfig {
            resolution: resolution.to_string(),
            imu: Some(DesiredImu::default()),
            ..DesiredConfig::default()
        }
    }

    #[tokio::test]
    async fn test_reconcile_thread_serializes_events() {
        let sensor = SimulatedChannel::new(SensorProfile::default());
        let journal = sensor.journal();
        let reconfigure = Reconfigure::new(sensor).unwrap();

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let handle = spawn_reconciler(reconfigure, rx, Some(results_tx)).unwrap();

        for (version, resolution) in [(1, "2048x1088x256"), (2, "999x999x1"), (3, "2048x1088x256")] {
            tx.send(DesiredStateEvent {
                version,
                desired: desired(resolution),
            })
            .await
            .unwrap();
        }
        drop(tx);

        let mut versions = Vec::new();
        while let Some(cycle) = results_rx.recv().await {
            versions.push(cycle.version);
            let report = cycle.result.unwrap();
            match cycle.version {
                1 => assert!(matches!(report.resolution, ResolutionOutcome::Changed { .. })),
                2 => assert!(matches!(report.resolution, ResolutionOutcome::Rejected { .. })),
                _ => assert_eq!(report.resolution, ResolutionOutcome::Unchanged),
            }
        }
        assert_eq!(versions, vec![1, 2, 3]);

        let reconfigure = tokio::task::spawn_blocking(move || handle.join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            reconfigure.channel().image_config().resolution(),
            Resolution::new(2048, 1088, 256)
        );
        assert_eq!(journal.count(Operation::GetDeviceModes), 1);
        assert_eq!(journal.count(Operation::StopStreams), 1);
    }

    #[tokio::test]
    async fn test_watcher_emits_only_on_change() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("desired.toml");
        std::fs::write(&path, "fps = 10.0\n").unwrap();

        let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let watcher = tokio::spawn(watch_desired(path.clone(), Duration::from_millis(10), tx));

        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.desired.fps, 10.0);

        // Unchanged contents produce no event
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());

        // Malformed contents are skipped
        std::fs::write(&path, "fps = \"fast\"\n").unwrap();
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());

        std::fs::write(&path, "fps = 20.0\n").unwrap();
        let second = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.desired.fps, 20.0);

        drop(rx);
        timeout(Duration::from_secs(5), watcher).await.unwrap().unwrap();
    }
}
