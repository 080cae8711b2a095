use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use retrack_core::domain::{
    Decision, ErrorEntry, ErrorReport, FailedRecordSummary, JobId, RecordId, RecordStats,
    SessionId, SessionStats,
};
use retrack_core::ports::{IdGenerator, SystemClock, UlidGenerator};
use retrack_core::{CleanupLoop, RecordTracker, TrackerBuilder, TrackerConfig};

/// Run a simulated batch through the record tracker and print the report.
#[derive(Debug, Parser)]
#[command(name = "retrack", version, about)]
struct Args {
    /// Tracker config file (defaults apply when missing).
    #[arg(long, default_value = "retrack.toml")]
    config: PathBuf,

    /// Number of records in the batch.
    #[arg(long, default_value_t = 5)]
    records: usize,

    /// Transient failures injected per record before it succeeds.
    #[arg(long, default_value_t = 1)]
    failures: u32,

    /// Number of records that hit an unrecoverable error.
    #[arg(long, default_value_t = 1)]
    fatal: usize,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// A failed submission, already classified for the tracker.
struct SubmitFailure {
    report: ErrorReport,
    /// The browser died and a restart was attempted.
    crashed: bool,
}

/// The external submission mechanism.
#[async_trait]
trait Submitter: Send + Sync {
    async fn submit(&self, id: &RecordId, attempt: u32) -> Result<String, SubmitFailure>;
}

/// Fails each record `failures` times (alternating network errors and browser
/// crashes), and fails `fatal` records permanently.
struct FlakySubmitter {
    failures: u32,
    fatal: HashSet<RecordId>,
    seen: Mutex<HashMap<RecordId, u32>>,
}

impl FlakySubmitter {
    fn new(failures: u32, fatal: HashSet<RecordId>) -> Self {
        Self {
            failures,
            fatal,
            seen: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Submitter for FlakySubmitter {
    async fn submit(&self, id: &RecordId, attempt: u32) -> Result<String, SubmitFailure> {
        if self.fatal.contains(id) {
            return Err(SubmitFailure {
                report: ErrorReport::new("form rejected: duplicate entry", "validation")
                    .recoverable(false),
                crashed: false,
            });
        }

        let failed_so_far = {
            let mut seen = self.seen.lock().await;
            let count = seen.entry(id.clone()).or_insert(0);
            *count += 1;
            *count - 1
        };
        if failed_so_far < self.failures {
            let crashed = failed_so_far % 2 == 1;
            let report = if crashed {
                ErrorReport::new("browser process exited", "browser_crash")
                    .with_trace(format!("attempt {attempt}: target closed"))
            } else {
                ErrorReport::new("navigation timeout", "network")
            };
            return Err(SubmitFailure { report, crashed });
        }

        Ok(format!("confirmation-{id}-{attempt}"))
    }
}

/// Drive one record from `initialize` to a terminal state.
async fn process_record(
    tracker: Arc<dyn RecordTracker>,
    submitter: Arc<dyn Submitter>,
    id: RecordId,
) -> anyhow::Result<()> {
    let mut attempt = 0;
    loop {
        if !tracker.should_continue_processing(&id).await {
            tracker
                .mark_failed(&id, Some("Max attempts exceeded".to_string()), false)
                .await?;
            return Ok(());
        }

        attempt += 1;
        tracker.start_attempt(&id, attempt).await?;

        let failure = match submitter.submit(&id, attempt).await {
            Ok(reference) => {
                tracker
                    .mark_processed(&id, Some(serde_json::json!({ "ref": reference })))
                    .await?;
                return Ok(());
            }
            Err(failure) => failure,
        };

        if failure.crashed {
            tracker
                .record_recovery_attempt(
                    &id,
                    "browser_restart",
                    true,
                    Some(serde_json::json!({ "attempt": attempt })),
                )
                .await?;
        }
        let recoverable = failure.report.is_recoverable();
        tracker
            .record_error(
                &id,
                failure.report,
                Some(serde_json::json!({ "attempt": attempt })),
            )
            .await?;

        match tracker.retry_decision(&id).await {
            Decision::Proceed => continue,
            Decision::Stop(reason) => {
                warn!(record_id = %id, ?reason, "giving up on record");
                tracker
                    .mark_failed(&id, Some(format!("{reason:?}")), recoverable)
                    .await?;
                return Ok(());
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchReport {
    session: Option<SessionStats>,
    records: Vec<RecordStats>,
    failed: Vec<FailedRecordSummary>,
    browser_crashes: HashMap<String, Vec<ErrorEntry>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = TrackerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let tracker: Arc<dyn RecordTracker> = Arc::new(
        TrackerBuilder::new()
            .config(config.clone())
            .build()
            .context("building tracker")?,
    );
    let cleanup = CleanupLoop::from_config(Arc::clone(&tracker), &config);

    let ids = UlidGenerator::new(SystemClock);
    let session_id: SessionId = ids.generate_session_id();
    let job_id: JobId = ids.generate_job_id();
    info!(session_id = %session_id, job_id = %job_id, records = args.records, "batch starting");

    let record_ids: Vec<RecordId> = (0..args.records)
        .map(|i| RecordId::new(format!("rec-{i:03}")))
        .collect();
    let fatal = record_ids.iter().take(args.fatal).cloned().collect();
    let submitter: Arc<dyn Submitter> = Arc::new(FlakySubmitter::new(args.failures, fatal));

    for (i, id) in record_ids.iter().enumerate() {
        tracker
            .initialize(
                id.clone(),
                serde_json::json!({ "name": format!("Company {i}") }),
                session_id.clone(),
                job_id.clone(),
            )
            .await?;
    }

    let mut workers = Vec::with_capacity(record_ids.len());
    for id in &record_ids {
        let tracker = Arc::clone(&tracker);
        let submitter = Arc::clone(&submitter);
        workers.push(tokio::spawn(process_record(tracker, submitter, id.clone())));
    }
    for worker in workers {
        worker.await.context("record worker panicked")??;
    }

    let mut records = Vec::with_capacity(record_ids.len());
    let mut browser_crashes = HashMap::new();
    for id in &record_ids {
        if let Some(stats) = tracker.get_record_stats(id).await {
            records.push(stats);
        }
        let crashes = tracker.get_error_correlation(id, "browser_crash").await;
        if !crashes.is_empty() {
            browser_crashes.insert(id.to_string(), crashes);
        }
    }
    let report = BatchReport {
        session: tracker.get_session_stats(&session_id).await,
        records,
        failed: tracker.get_failed_records().await,
        browser_crashes,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    cleanup.shutdown_and_join().await;
    info!("batch finished");
    Ok(())
}
