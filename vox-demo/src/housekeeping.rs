//! Retention Housekeeping
//!
//! Sweeps tracking records of any owner that are older than the retention
//! window. These are rows the interactive reset left behind (failed deletes,
//! abandoned sessions). Unlike the logout path, deletes here are retried with
//! exponential backoff: completeness matters more than latency.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vox_core::ChangeId;

use crate::config::RetentionConfig;
use crate::error::DemoError;
use crate::throttle::pause;
use crate::tracking::TrackingStore;

/// Result of one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub swept_at: DateTime<Utc>,
    /// Records created before this instant were eligible
    pub cutoff: DateTime<Utc>,
    /// Eligible records found
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Delete attempts beyond the first
    pub retries: usize,
    pub batches: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SweepReport {
    fn new(cutoff: DateTime<Utc>) -> Self {
        Self {
            swept_at: Utc::now(),
            cutoff,
            scanned: 0,
            deleted: 0,
            failed: 0,
            retries: 0,
            batches: 0,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }
}

/// Control messages for a spawned sweeper
#[derive(Debug)]
pub enum SweepCommand {
    /// Sweep immediately; the report is sent back on the enclosed channel
    SweepNow(oneshot::Sender<SweepReport>),
    /// Skip interval sweeps until resumed
    Pause,
    /// Restart the interval from now
    Resume,
    Stop,
}

/// Handle to a sweeper running on its own task
pub struct SweeperHandle {
    commands: mpsc::Sender<SweepCommand>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Sweep immediately and wait for the report; `None` once the task is gone
    pub async fn sweep_now(&self) -> Option<SweepReport> {
        let (reply, report) = oneshot::channel();
        self.commands.send(SweepCommand::SweepNow(reply)).await.ok()?;
        report.await.ok()
    }

    pub async fn pause(&self) -> bool {
        self.commands.send(SweepCommand::Pause).await.is_ok()
    }

    pub async fn resume(&self) -> bool {
        self.commands.send(SweepCommand::Resume).await.is_ok()
    }

    /// Extra sender for callers that drive the task from elsewhere
    pub fn sender(&self) -> mpsc::Sender<SweepCommand> {
        self.commands.clone()
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.commands.send(SweepCommand::Stop).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "Retention sweeper task ended abnormally");
        }
    }
}

pub struct RetentionSweeper {
    store: TrackingStore,
    config: Arc<RwLock<RetentionConfig>>,
    last_result: RwLock<Option<SweepReport>>,
    total_deleted: RwLock<usize>,
}

impl RetentionSweeper {
    pub fn new(store: TrackingStore, config: RetentionConfig) -> Self {
        Self {
            store,
            config: Arc::new(RwLock::new(config)),
            last_result: RwLock::new(None),
            total_deleted: RwLock::new(0),
        }
    }

    /// Sweep with the configured retention window
    pub async fn sweep(&self) -> SweepReport {
        let days = self.config.read().await.retention_days;
        self.sweep_older_than(days).await
    }

    /// Sweep records older than `retention_days`
    pub async fn sweep_older_than(&self, retention_days: u32) -> SweepReport {
        let start = Instant::now();
        let config = self.config.read().await.clone();
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));
        let mut report = SweepReport::new(cutoff);

        info!(retention_days, cutoff = %cutoff, "Starting retention sweep");

        let records = match self.store.list_expired(cutoff).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not list expired tracking records");
                report.errors.push(format!("list expired: {}", e));
                report.duration_ms = start.elapsed().as_millis() as u64;
                return report;
            }
        };
        report.scanned = records.len();

        for (index, batch) in records.chunks(config.batch_size.max(1)).enumerate() {
            if index > 0 {
                pause(config.batch_pause()).await;
            }
            report.batches += 1;

            for record in batch {
                match self.delete_with_retry(record.id(), &config, &mut report).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        report.failed += 1;
                        report
                            .errors
                            .push(format!("delete {}: {}", record.id(), e));
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        *self.total_deleted.write().await += report.deleted;

        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            retries = report.retries,
            duration_ms = report.duration_ms,
            "Retention sweep complete"
        );

        *self.last_result.write().await = Some(report.clone());
        report
    }

    async fn delete_with_retry(
        &self,
        id: &ChangeId,
        config: &RetentionConfig,
        report: &mut SweepReport,
    ) -> Result<(), DemoError> {
        let max_attempts = config.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.store.delete_record(id).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < max_attempts => {
                    let backoff = config.retry.backoff(attempt);
                    debug!(
                        change_id = %id,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        rate_limited = e.is_rate_limited(),
                        error = %e,
                        "Delete failed, retrying"
                    );
                    pause(backoff).await;
                    attempt += 1;
                    report.retries += 1;
                }
                Err(e) => {
                    warn!(change_id = %id, attempts = max_attempts, error = %e, "Giving up on tracking record");
                    return Err(e);
                }
            }
        }
    }

    pub async fn get_last_result(&self) -> Option<SweepReport> {
        self.last_result.read().await.clone()
    }

    pub async fn get_total_deleted(&self) -> usize {
        *self.total_deleted.read().await
    }

    pub async fn update_config(&self, config: RetentionConfig) {
        *self.config.write().await = config;
    }

    /// Move the sweeper onto its own task.
    ///
    /// Interval sweeps run while `auto_sweep_enabled` is set and the task is
    /// not paused. The interval is measured from the end of the previous
    /// sweep, and commands handled in between do not push it back.
    pub fn spawn(self: Arc<Self>) -> SweeperHandle {
        let (commands, mut inbox) = mpsc::channel(8);

        let task = tokio::spawn(async move {
            let mut paused = false;
            let mut next_due = Instant::now() + self.config.read().await.sweep_interval();

            loop {
                let (auto_sweep, interval) = {
                    let config = self.config.read().await;
                    (config.auto_sweep_enabled, config.sweep_interval())
                };

                tokio::select! {
                    command = inbox.recv() => match command {
                        Some(SweepCommand::SweepNow(reply)) => {
                            let report = self.sweep().await;
                            // The caller may have stopped waiting
                            let _ = reply.send(report);
                        }
                        Some(SweepCommand::Pause) => {
                            paused = true;
                            debug!("Interval sweeps paused");
                        }
                        Some(SweepCommand::Resume) => {
                            paused = false;
                            next_due = Instant::now() + interval;
                            debug!("Interval sweeps resumed");
                        }
                        Some(SweepCommand::Stop) | None => break,
                    },
                    _ = tokio::time::sleep_until(next_due), if auto_sweep && !paused => {
                        self.sweep().await;
                        next_due = Instant::now() + interval;
                    }
                }
            }

            let total_deleted = *self.total_deleted.read().await;
            info!(
                total_deleted = total_deleted,
                "Retention sweeper stopped"
            );
        });

        SweeperHandle { commands, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemoConfig;
    use crate::gateway::{Gateway, Platform};
    use crate::throttle::Throttle;
    use std::time::Duration;
    use vox_backend::{Fault, FaultKind, MemoryBackend, Operation};
    use vox_core::{ChangeTarget, DocumentRef, TrackedChange, DEMO_EMAIL};

    fn setup() -> (Arc<MemoryBackend>, TrackingStore, DemoConfig) {
        let backend = Arc::new(MemoryBackend::new());
        let config = DemoConfig::test();
        let gateway = Gateway::new(
            Platform::from_backend(backend.clone()),
            Arc::new(Throttle::unlimited()),
        );
        (backend, TrackingStore::new(gateway, &config), config)
    }

    async fn insert_aged(store: &TrackingStore, owner: &str, doc_id: &str, age_days: i64) {
        let mut change = TrackedChange::new(
            ChangeTarget::Document(DocumentRef::new("voxcampus", "posts", doc_id)),
            owner,
        );
        change.created_at = Utc::now() - ChronoDuration::days(age_days);
        store.insert(&change).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_records() {
        let (_backend, store, config) = setup();
        insert_aged(&store, DEMO_EMAIL, "old1", 10).await;
        insert_aged(&store, DEMO_EMAIL, "old2", 8).await;
        insert_aged(&store, "former-demo@voxcampus.app", "old3", 30).await;
        insert_aged(&store, DEMO_EMAIL, "fresh1", 1).await;
        insert_aged(&store, DEMO_EMAIL, "fresh2", 0).await;

        let sweeper = RetentionSweeper::new(store.clone(), config.retention.clone());
        let report = sweeper.sweep().await;

        assert_eq!(report.scanned, 3);
        assert_eq!(report.deleted, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(store.count_outstanding(DEMO_EMAIL).await.unwrap(), 2);
        assert_eq!(sweeper.get_total_deleted().await, 3);
    }

    #[tokio::test]
    async fn test_sweep_retries_then_succeeds() {
        let (backend, store, config) = setup();
        insert_aged(&store, DEMO_EMAIL, "old1", 10).await;
        backend
            .inject(
                Fault::new(Operation::DeleteDocument, FaultKind::RateLimited)
                    .on(store.collection())
                    .times(2),
            )
            .await;

        let sweeper = RetentionSweeper::new(store.clone(), config.retention.clone());
        let report = sweeper.sweep().await;

        assert_eq!(report.deleted, 1);
        assert_eq!(report.retries, 2);
        assert_eq!(store.count_outstanding(DEMO_EMAIL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_gives_up_after_max_attempts() {
        let (backend, store, config) = setup();
        insert_aged(&store, DEMO_EMAIL, "old1", 10).await;
        backend
            .inject(Fault::new(Operation::DeleteDocument, FaultKind::Network).on(store.collection()))
            .await;

        let sweeper = RetentionSweeper::new(store.clone(), config.retention.clone());
        let report = sweeper.sweep().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.retries, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            backend.calls_for(Operation::DeleteDocument).await.len(),
            config.retention.retry.max_attempts as usize
        );
    }

    #[tokio::test]
    async fn test_explicit_window_overrides_config() {
        let (_backend, store, config) = setup();
        insert_aged(&store, DEMO_EMAIL, "d3", 3).await;

        let sweeper = RetentionSweeper::new(store.clone(), config.retention.clone());
        assert_eq!(sweeper.sweep().await.deleted, 0);
        assert_eq!(sweeper.sweep_older_than(2).await.deleted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_answers_commands() {
        let (_backend, store, config) = setup();
        insert_aged(&store, DEMO_EMAIL, "old1", 10).await;

        let retention = RetentionConfig {
            auto_sweep_enabled: false,
            ..config.retention.clone()
        };
        let sweeper = Arc::new(RetentionSweeper::new(store.clone(), retention));
        let handle = sweeper.clone().spawn();

        assert!(handle.pause().await);
        assert!(handle.resume().await);
        let report = handle.sweep_now().await.unwrap();
        assert_eq!(report.deleted, 1);
        handle.shutdown().await;

        assert_eq!(sweeper.get_last_result().await, Some(report));
        assert_eq!(store.count_outstanding(DEMO_EMAIL).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_sweeps_stop_while_paused() {
        let (_backend, store, config) = setup();
        let retention = RetentionConfig {
            auto_sweep_enabled: true,
            sweep_interval_secs: 60,
            ..config.retention.clone()
        };
        let sweeper = Arc::new(RetentionSweeper::new(store.clone(), retention));
        let handle = sweeper.clone().spawn();

        insert_aged(&store, DEMO_EMAIL, "old1", 10).await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(sweeper.get_total_deleted().await, 1);

        handle.pause().await;
        insert_aged(&store, DEMO_EMAIL, "old2", 10).await;
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(store.count_outstanding(DEMO_EMAIL).await.unwrap(), 1);

        handle.resume().await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(sweeper.get_total_deleted().await, 2);

        handle.shutdown().await;
    }
}
