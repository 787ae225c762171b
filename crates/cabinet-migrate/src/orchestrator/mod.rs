//! Upload orchestrator - main workflow coordinator.
//!
//! Drives one run through `Idle → Authenticating → Running → Draining →
//! Finished`. Records are processed strictly one at a time in `object_id`
//! order; a record's outcome is persisted (or discarded) before the next one
//! starts, so an interrupted run resumes at the first record still pending.

use crate::config::Config;
use crate::error::{MigrateError, Result};
use crate::remote::{DocumentUploader, Outcome, RemoteSession, RemoteUploader, SessionManager};
use crate::staging::{PgStagingStore, StagingRecord, StagingStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Idle,
    Authenticating,
    Running,
    Draining,
    Finished,
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every pending record was attempted.
    Completed,
    /// A relogin failed; the remaining records were not attempted.
    Aborted,
    /// Stopped between records on request.
    Cancelled,
    /// Listed pending records without uploading.
    DryRun,
}

/// Why the record loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Exhausted,
    ReloginFailed,
    Cancelled,
}

/// Result of an upload run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Pending records found at the start of the run.
    pub records_pending: usize,

    /// Records for which at least one upload was attempted.
    pub records_attempted: usize,

    /// Records uploaded and recorded in the staging store.
    pub records_uploaded: usize,

    /// Records the service reported as duplicates.
    pub records_skipped: usize,

    /// Records that failed (rejected, errored, or lost the session twice).
    pub records_failed: usize,

    /// Records never attempted because the run stopped early.
    pub records_not_attempted: usize,

    /// Relogins performed after session expiry.
    pub relogins: usize,

    /// `object_id`s of failed records.
    pub failed_records: Vec<String>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity check for the staging store and the document service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub staging_connected: bool,
    pub staging_latency_ms: u64,
    pub staging_error: Option<String>,
    pub remote_connected: bool,
    pub remote_latency_ms: u64,
    pub remote_error: Option<String>,
    pub healthy: bool,
}

/// Running counters for one run.
#[derive(Debug, Default)]
struct Tally {
    attempted: usize,
    uploaded: usize,
    skipped: usize,
    failed: usize,
    relogins: usize,
    failed_records: Vec<String>,
}

impl Tally {
    fn fail(&mut self, object_id: &str) {
        self.failed += 1;
        self.failed_records.push(object_id.to_string());
    }
}

/// One JSON line per record when progress reporting is enabled.
#[derive(Serialize)]
struct ProgressUpdate<'a> {
    index: usize,
    total: usize,
    object_id: &'a str,
    tag: &'static str,
    #[serde(flatten)]
    outcome: &'a Outcome,
}

/// Upload orchestrator.
pub struct Orchestrator {
    store: Arc<dyn StagingStore>,
    session: Arc<dyn SessionManager>,
    uploader: Arc<dyn DocumentUploader>,
    delay: Duration,
    progress: bool,
}

impl Orchestrator {
    /// Connect to the staging store and prepare the remote session.
    ///
    /// Fails if the staging store cannot be reached.
    pub async fn new(config: Config) -> Result<Self> {
        let store = PgStagingStore::connect(&config.staging).await?;
        let session = Arc::new(RemoteSession::new(&config.remote)?);
        let uploader = RemoteUploader::new(session.clone(), &config.remote);

        Ok(Self::from_parts(Arc::new(store), session, Arc::new(uploader))
            .with_delay(config.upload.delay()))
    }

    /// Assemble an orchestrator from explicit collaborators.
    pub fn from_parts(
        store: Arc<dyn StagingStore>,
        session: Arc<dyn SessionManager>,
        uploader: Arc<dyn DocumentUploader>,
    ) -> Self {
        Self {
            store,
            session,
            uploader,
            delay: Duration::ZERO,
            progress: false,
        }
    }

    /// Fixed pause before every upload attempt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Print one JSON progress line per record to stderr.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Staging store used by this orchestrator.
    pub fn store(&self) -> Arc<dyn StagingStore> {
        self.store.clone()
    }

    /// Check that the staging table is readable and the service accepts the
    /// configured credentials. Logs off again after a successful login.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let started = Instant::now();
        let (staging_connected, staging_error) = match self.store.summary().await {
            Ok(summary) => {
                debug!(
                    "Staging table holds {} records ({} pending)",
                    summary.total, summary.pending
                );
                (true, None)
            }
            Err(e) => (false, Some(e.to_string())),
        };
        let staging_latency_ms = started.elapsed().as_millis() as u64;

        let started = Instant::now();
        let remote_connected = self.session.login().await;
        let remote_latency_ms = started.elapsed().as_millis() as u64;
        let remote_error = if remote_connected {
            self.session.logoff().await;
            None
        } else {
            Some("login rejected or service unreachable".to_string())
        };

        Ok(HealthCheckResult {
            staging_connected,
            staging_latency_ms,
            staging_error,
            remote_connected,
            remote_latency_ms,
            remote_error,
            healthy: staging_connected && remote_connected,
        })
    }

    /// Run the upload loop.
    ///
    /// Returns `Err(AuthFailure)` when the initial login is rejected and the
    /// store error when pending records cannot be read. In both cases the
    /// cleanup steps still run. Every other failure is reported through the
    /// returned [`MigrationResult`].
    pub async fn run(&self, cancel: CancellationToken, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut phase = RunPhase::Idle;

        info!(
            "Starting upload run {} (staging: {})",
            run_id,
            self.store.backend_type()
        );

        if dry_run {
            let pending = self.store.fetch_pending().await;
            self.close_store().await;
            let pending = pending?;
            for record in &pending {
                info!(
                    "[DRY RUN] {} -> cabinet {} ({})",
                    record.object_id, record.destination_cabinet_id, record.source_path
                );
            }
            let tally = Tally::default();
            return Ok(self.finish(run_id, started_at, RunStatus::DryRun, pending.len(), &tally));
        }

        transition(&mut phase, RunPhase::Authenticating);
        if !self.session.login().await {
            error!("Initial login failed, no records processed");
            self.close_store().await;
            return Err(MigrateError::AuthFailure(
                "document service rejected the initial login".to_string(),
            ));
        }

        let records = match self.store.fetch_pending().await {
            Ok(records) => records,
            Err(e) => {
                error!("Cannot read pending records: {}", e);
                transition(&mut phase, RunPhase::Draining);
                self.drain().await;
                return Err(e);
            }
        };
        info!("Found {} pending records", records.len());

        let mut tally = Tally::default();
        let exit = if records.is_empty() {
            LoopExit::Exhausted
        } else {
            transition(&mut phase, RunPhase::Running);
            self.process_records(&records, &mut tally, &cancel).await
        };

        transition(&mut phase, RunPhase::Draining);
        self.drain().await;
        transition(&mut phase, RunPhase::Finished);

        let status = match exit {
            LoopExit::Exhausted => RunStatus::Completed,
            LoopExit::ReloginFailed => RunStatus::Aborted,
            LoopExit::Cancelled => RunStatus::Cancelled,
        };

        Ok(self.finish(run_id, started_at, status, records.len(), &tally))
    }

    /// Walk the pending records in order.
    async fn process_records(
        &self,
        records: &[StagingRecord],
        tally: &mut Tally,
        cancel: &CancellationToken,
    ) -> LoopExit {
        let total = records.len();

        for (index, record) in records.iter().enumerate() {
            if !self.pause_unless_cancelled(cancel).await || cancel.is_cancelled() {
                info!("Cancellation requested, stopping before {}", record.object_id);
                return LoopExit::Cancelled;
            }

            tally.attempted += 1;
            let mut relogged = false;

            let outcome = loop {
                let outcome = self.uploader.upload(record).await;

                if outcome != Outcome::AuthExpired || relogged {
                    break outcome;
                }

                warn!("{}: session expired, logging in again", record.object_id);
                tally.relogins += 1;
                if !self.session.login().await {
                    error!(
                        "Relogin failed at {}; {} records left unattempted",
                        record.object_id,
                        total - index - 1
                    );
                    tally.fail(&record.object_id);
                    self.report(index, total, record, &outcome);
                    return LoopExit::ReloginFailed;
                }
                relogged = true;
                // The record is in flight; its retry is not cancellable
                self.pause().await;
            };

            self.settle(record, &outcome, tally).await;
            self.report(index, total, record, &outcome);
        }

        LoopExit::Exhausted
    }

    /// Apply one final outcome to the staging store and counters.
    async fn settle(&self, record: &StagingRecord, outcome: &Outcome, tally: &mut Tally) {
        match outcome {
            Outcome::Success { remote_id } => {
                match self
                    .store
                    .update_on_success(&record.object_id, *remote_id, Utc::now())
                    .await
                {
                    Ok(()) => tally.uploaded += 1,
                    Err(e) => {
                        // The document exists remotely; the next run will see a 409 for it
                        error!(
                            "{}: uploaded as document {} but not recorded: {}",
                            record.object_id, remote_id, e
                        );
                        tally.fail(&record.object_id);
                    }
                }
            }
            Outcome::SkippedDuplicate => tally.skipped += 1,
            Outcome::AuthExpired => {
                warn!(
                    "{}: session expired again after relogin, giving up on record",
                    record.object_id
                );
                tally.fail(&record.object_id);
            }
            Outcome::Rejected { .. } | Outcome::GeneralFailure { .. } => {
                tally.fail(&record.object_id)
            }
        }
    }

    fn report(&self, index: usize, total: usize, record: &StagingRecord, outcome: &Outcome) {
        match outcome {
            Outcome::Success { .. } | Outcome::SkippedDuplicate => info!(
                "[{}/{}] {} {}: {}",
                index + 1,
                total,
                outcome.tag(),
                record.object_id,
                outcome.detail()
            ),
            _ => warn!(
                "[{}/{}] {} {}: {}",
                index + 1,
                total,
                outcome.tag(),
                record.object_id,
                outcome.detail()
            ),
        }

        if self.progress {
            let update = ProgressUpdate {
                index: index + 1,
                total,
                object_id: &record.object_id,
                tag: outcome.tag(),
                outcome,
            };
            if let Ok(line) = serde_json::to_string(&update) {
                eprintln!("{}", line);
            }
        }
    }

    /// Wait out the delay before a record's first attempt. Returns false if
    /// the token fired first.
    async fn pause_unless_cancelled(&self, cancel: &CancellationToken) -> bool {
        if self.delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Log off and close the store. Both steps always run.
    async fn drain(&self) {
        self.session.logoff().await;
        self.close_store().await;
    }

    async fn close_store(&self) {
        if let Err(e) = self.store.close().await {
            warn!("Closing staging store failed: {}", e);
        }
    }

    fn finish(
        &self,
        run_id: String,
        started_at: DateTime<Utc>,
        status: RunStatus,
        pending: usize,
        tally: &Tally,
    ) -> MigrationResult {
        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let result = MigrationResult {
            run_id,
            status,
            duration_seconds: duration,
            started_at,
            completed_at,
            records_pending: pending,
            records_attempted: tally.attempted,
            records_uploaded: tally.uploaded,
            records_skipped: tally.skipped,
            records_failed: tally.failed,
            records_not_attempted: pending - tally.attempted,
            relogins: tally.relogins,
            failed_records: tally.failed_records.clone(),
        };

        info!(
            "Run {:?}: {} pending, {} attempted, {} uploaded, {} skipped, {} failed, {} not attempted in {:.1}s",
            result.status,
            result.records_pending,
            result.records_attempted,
            result.records_uploaded,
            result.records_skipped,
            result.records_failed,
            result.records_not_attempted,
            result.duration_seconds
        );

        result
    }
}

fn transition(phase: &mut RunPhase, next: RunPhase) {
    debug!("Run phase {:?} -> {:?}", phase, next);
    *phase = next;
}
