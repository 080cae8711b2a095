//! CleanupLoop - 古いレコード状態の定期削除
//!
//! `interval` ごとに `cleanup(max_age_hours)` を呼び、`watch` で停止します。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::TrackerConfig;
use crate::tracker::RecordTracker;

/// Handle to the background cleanup task.
///
/// - `request_shutdown()` stops the loop after the current pass
/// - `shutdown_and_join()` also waits for it to exit
pub struct CleanupLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl CleanupLoop {
    /// Spawn a loop that runs `cleanup(max_age_hours)` every `period`.
    ///
    /// The first pass runs immediately.
    pub fn spawn(tracker: Arc<dyn RecordTracker>, period: Duration, max_age_hours: u64) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // tokio::time::interval panics on a zero period.
        let period = period.max(Duration::from_millis(1));
        let join = tokio::spawn(cleanup_loop(tracker, period, max_age_hours, shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn from_config(tracker: Arc<dyn RecordTracker>, config: &TrackerConfig) -> Self {
        Self::spawn(
            tracker,
            config.cleanup_interval(),
            config.cleanup_max_age_hours,
        )
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.join.await {
            error!(error = %err, "cleanup task ended abnormally");
        }
    }
}

async fn cleanup_loop(
    tracker: Arc<dyn RecordTracker>,
    period: Duration,
    max_age_hours: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(?period, max_age_hours, "cleanup loop started");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let report = tracker.cleanup(max_age_hours).await;
                debug!(records_removed = report.records_removed, "cleanup pass finished");
            }
        }
    }

    info!("cleanup loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CleanupReport, Decision, ErrorEntry, ErrorReport, FailedRecordSummary, JobId, RecordExport,
        RecordId, RecordState, RecordStats, RecoveryAttempt, SessionId, SessionStats,
    };
    use crate::error::TrackerError;
    use crate::ports::FixedClock;
    use crate::tracker::InMemoryTracker;
    use chrono::{TimeZone, Utc};

    async fn tracker_with_record(clock: FixedClock) -> Arc<InMemoryTracker> {
        let tracker = Arc::new(InMemoryTracker::with_clock(
            TrackerConfig::default(),
            Arc::new(clock),
        ));
        tracker
            .initialize(
                RecordId::new("r1"),
                serde_json::json!({"name": "Acme"}),
                SessionId::new("s1"),
                JobId::new("j1"),
            )
            .await
            .unwrap();
        tracker
    }

    #[tokio::test(start_paused = true)]
    async fn loop_purges_expired_records() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let tracker = tracker_with_record(clock.clone()).await;

        let cleanup = CleanupLoop::spawn(tracker.clone(), Duration::from_secs(3600), 24);

        // Fresh record survives the immediate first pass.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(tracker.len().await, 1);

        clock.advance(chrono::Duration::hours(25));
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert!(tracker.is_empty().await);

        cleanup.shutdown_and_join().await;
    }

    struct PanickingTracker;

    #[async_trait::async_trait]
    impl RecordTracker for PanickingTracker {
        async fn initialize(
            &self,
            _: RecordId,
            _: serde_json::Value,
            _: SessionId,
            _: JobId,
        ) -> Result<RecordState, TrackerError> {
            unreachable!()
        }
        async fn start_attempt(&self, _: &RecordId, _: u32) -> Result<(), TrackerError> {
            unreachable!()
        }
        async fn record_error(
            &self,
            _: &RecordId,
            _: ErrorReport,
            _: Option<serde_json::Value>,
        ) -> Result<ErrorEntry, TrackerError> {
            unreachable!()
        }
        async fn record_recovery_attempt(
            &self,
            _: &RecordId,
            _: &str,
            _: bool,
            _: Option<serde_json::Value>,
        ) -> Result<RecoveryAttempt, TrackerError> {
            unreachable!()
        }
        async fn mark_processed(
            &self,
            _: &RecordId,
            _: Option<serde_json::Value>,
        ) -> Result<(), TrackerError> {
            unreachable!()
        }
        async fn mark_failed(
            &self,
            _: &RecordId,
            _: Option<String>,
            _: bool,
        ) -> Result<(), TrackerError> {
            unreachable!()
        }
        async fn continue_decision(&self, _: &RecordId) -> Decision {
            unreachable!()
        }
        async fn retry_decision(&self, _: &RecordId) -> Decision {
            unreachable!()
        }
        async fn get_record_stats(&self, _: &RecordId) -> Option<RecordStats> {
            unreachable!()
        }
        async fn get_session_stats(&self, _: &SessionId) -> Option<SessionStats> {
            unreachable!()
        }
        async fn get_failed_records(&self) -> Vec<FailedRecordSummary> {
            unreachable!()
        }
        async fn cleanup(&self, _: u64) -> CleanupReport {
            panic!("cleanup blew up")
        }
        async fn get_error_correlation(
            &self,
            _: &RecordId,
            _: &str,
        ) -> Vec<ErrorEntry> {
            unreachable!()
        }
        async fn export_record_state(&self, _: &RecordId) -> Option<RecordExport> {
            unreachable!()
        }
        async fn len(&self) -> usize {
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_survives_a_panicked_task() {
        let cleanup = CleanupLoop::spawn(Arc::new(PanickingTracker), Duration::from_secs(60), 24);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Returns instead of propagating the task's panic.
        cleanup.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let tracker = tracker_with_record(clock.clone()).await;

        let cleanup = CleanupLoop::spawn(tracker.clone(), Duration::from_secs(60), 0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        cleanup.shutdown_and_join().await;

        // No pass runs after shutdown.
        tracker
            .initialize(
                RecordId::new("r2"),
                serde_json::json!({}),
                SessionId::new("s1"),
                JobId::new("j1"),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(tracker.len().await, 1);
    }
}
