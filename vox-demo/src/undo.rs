//! Tracked-Change Undo Engine
//!
//! Restores the demo account to its baseline:
//!
//! 1. reset the preference bag in bulk
//! 2. fetch every outstanding record owned by the demo identity
//! 3. group the records by change kind, in a fixed group order
//! 4. undo each record strictly one at a time, pausing between records and
//!    longer between groups
//! 5. delete each tracking record once its target is gone
//!
//! A target that no longer exists counts as undone, so overlapping resets
//! converge on the same state. A target whose delete genuinely fails keeps
//! its tracking record, so the next reset (or housekeeping) picks it up.
//! Nothing in here aborts the batch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vox_backend::BackendError;
use vox_core::{ChangeKind, ChangeTarget, DemoIdentity, StoredChange, TrackedChange, UndoAction};

use crate::config::PacingConfig;
use crate::gateway::Gateway;
use crate::preferences::PreferenceResetExecutor;
use crate::throttle::pause;
use crate::tracking::TrackingStore;

/// Grouping key; known kinds first, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeGroup {
    Known(ChangeKind),
    Unrecognized(String),
}

impl ChangeGroup {
    fn of(record: &StoredChange) -> Self {
        match record {
            StoredChange::Tracked(change) => ChangeGroup::Known(change.kind()),
            StoredChange::Unrecognized { kind, .. } => ChangeGroup::Unrecognized(kind.clone()),
        }
    }
}

impl fmt::Display for ChangeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeGroup::Known(kind) => write!(f, "{}", kind),
            ChangeGroup::Unrecognized(tag) => write!(f, "unrecognized:{}", tag),
        }
    }
}

/// Group records by kind. Within a group, fetch order is kept.
pub fn group_changes(records: Vec<StoredChange>) -> BTreeMap<ChangeGroup, Vec<StoredChange>> {
    let mut groups: BTreeMap<ChangeGroup, Vec<StoredChange>> = BTreeMap::new();
    for record in records {
        groups.entry(ChangeGroup::of(&record)).or_default().push(record);
    }
    groups
}

/// Result of one reset run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoReport {
    /// Whether the bulk preference reset succeeded
    pub preferences_reset: bool,
    /// Records fetched for the demo identity
    pub fetched: usize,
    /// Number of change-kind groups processed
    pub groups: usize,
    /// Targets deleted by this run
    pub targets_deleted: usize,
    /// Targets that were already gone
    pub already_absent: usize,
    /// Targets whose delete failed
    pub target_failures: usize,
    /// Records needing no per-record action (covered by the preference reset)
    pub no_action: usize,
    /// Unrecognized records
    pub skipped: usize,
    /// Tracking records removed
    pub records_deleted: usize,
    /// Tracking records left behind after a failed delete
    pub record_failures: usize,
    /// Failures classified as rate-limit rejections
    pub rate_limited: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl UndoReport {
    /// Every fetched record was undone and removed
    pub fn is_complete(&self) -> bool {
        self.target_failures == 0 && self.record_failures == 0 && self.errors.is_empty()
    }

    fn note_failure(&mut self, context: String, error: &BackendError) {
        if error.is_rate_limited() {
            self.rate_limited += 1;
            warn!(context = %context, error = %error, "Rate limited during undo");
        } else {
            warn!(context = %context, error = %error, "Undo step failed");
        }
        self.errors.push(format!("{}: {}", context, error));
    }
}

enum TargetOutcome {
    Deleted,
    AlreadyAbsent,
    NoAction,
    Skipped,
    Failed,
}

/// Undo engine for the demo identity
#[derive(Clone)]
pub struct UndoEngine {
    gateway: Gateway,
    store: TrackingStore,
    preferences: PreferenceResetExecutor,
    identity: DemoIdentity,
    pacing: PacingConfig,
}

impl UndoEngine {
    pub fn new(
        gateway: Gateway,
        store: TrackingStore,
        preferences: PreferenceResetExecutor,
        identity: DemoIdentity,
        pacing: PacingConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            preferences,
            identity,
            pacing,
        }
    }

    /// Reset the demo account. Safe to call repeatedly; a no-op when nothing
    /// is outstanding apart from the preference reset.
    pub async fn reset_demo_user_session(&self) -> UndoReport {
        let start = Instant::now();
        let mut report = UndoReport {
            preferences_reset: self.preferences.reset_preferences().await,
            ..Default::default()
        };

        let records = match self.store.list_outstanding(self.identity.email()).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not list outstanding tracked changes");
                report.errors.push(format!("list outstanding: {}", e));
                report.duration_ms = start.elapsed().as_millis() as u64;
                return report;
            }
        };

        report.fetched = records.len();
        if records.is_empty() {
            debug!(email = %self.identity, "No outstanding tracked changes");
            report.duration_ms = start.elapsed().as_millis() as u64;
            return report;
        }

        info!(email = %self.identity, count = records.len(), "Undoing tracked changes");

        let groups = group_changes(records);
        report.groups = groups.len();

        for (group_index, (group, records)) in groups.into_iter().enumerate() {
            if group_index > 0 {
                pause(self.pacing.between_groups()).await;
            }
            debug!(group = %group, count = records.len(), "Processing change group");

            for (index, record) in records.iter().enumerate() {
                if index > 0 {
                    pause(self.pacing.between_records()).await;
                }
                self.undo_record(record, &mut report).await;
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            fetched = report.fetched,
            deleted = report.targets_deleted,
            already_absent = report.already_absent,
            failed = report.target_failures,
            records_deleted = report.records_deleted,
            rate_limited = report.rate_limited,
            duration_ms = report.duration_ms,
            "Demo session reset complete"
        );
        report
    }

    async fn undo_record(&self, record: &StoredChange, report: &mut UndoReport) {
        let outcome = match record {
            StoredChange::Tracked(change) => self.undo_target(change, report).await,
            StoredChange::Unrecognized { id, kind, reason } => {
                warn!(change_id = %id, kind = %kind, reason = %reason, "Skipping unrecognized tracked change");
                TargetOutcome::Skipped
            }
        };

        match outcome {
            TargetOutcome::Deleted => report.targets_deleted += 1,
            TargetOutcome::AlreadyAbsent => report.already_absent += 1,
            TargetOutcome::NoAction => report.no_action += 1,
            TargetOutcome::Skipped => report.skipped += 1,
            TargetOutcome::Failed => {
                report.target_failures += 1;
                // Keep the record so a later reset retries the target
                return;
            }
        }

        match self.store.delete_record(record.id()).await {
            Ok(()) => report.records_deleted += 1,
            Err(crate::error::DemoError::Backend(e)) => {
                report.record_failures += 1;
                report.note_failure(format!("delete record {}", record.id()), &e);
            }
            Err(e) => {
                report.record_failures += 1;
                warn!(change_id = %record.id(), error = %e, "Failed to delete tracking record");
                report.errors.push(format!("delete record {}: {}", record.id(), e));
            }
        }
    }

    async fn undo_target(&self, change: &TrackedChange, report: &mut UndoReport) -> TargetOutcome {
        let result = match (change.kind().undo_action(), &change.target) {
            (UndoAction::CoveredByPreferenceReset, _) => return TargetOutcome::NoAction,
            (UndoAction::DeleteFile, ChangeTarget::File(file)) => {
                self.gateway
                    .delete_file(&file.bucket_name, &file.file_id)
                    .await
            }
            (UndoAction::DeleteDocument, target) => match target.document() {
                Some(doc) => {
                    self.gateway
                        .delete_document(&doc.database_id, &doc.collection_name, &doc.document_id)
                        .await
                }
                None => return TargetOutcome::Skipped,
            },
            (UndoAction::DeleteFile, _) => return TargetOutcome::Skipped,
        };

        match result {
            Ok(()) => {
                debug!(change_id = %change.id, target = %change.target, "Target deleted");
                TargetOutcome::Deleted
            }
            Err(e) if e.is_not_found() => {
                debug!(change_id = %change.id, target = %change.target, "Target already gone");
                TargetOutcome::AlreadyAbsent
            }
            Err(e) => {
                report.note_failure(format!("undo {}", change.target), &e);
                TargetOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::{ChangeId, DocumentRef, FileRef, DEMO_EMAIL};

    fn tracked(target: ChangeTarget) -> StoredChange {
        StoredChange::Tracked(TrackedChange::new(target, DEMO_EMAIL))
    }

    #[test]
    fn test_group_order_is_deterministic() {
        let records = vec![
            StoredChange::Unrecognized {
                id: ChangeId::from("u1"),
                kind: "hologram".into(),
                reason: "unknown".into(),
            },
            tracked(ChangeTarget::File(FileRef::new("avatars", "f1"))),
            tracked(ChangeTarget::Document(DocumentRef::new("db", "posts", "p1"))),
            tracked(ChangeTarget::Document(DocumentRef::new("db", "posts", "p2"))),
        ];

        let groups = group_changes(records);
        let keys: Vec<String> = groups.keys().map(|g| g.to_string()).collect();
        assert_eq!(keys, vec!["document", "file", "unrecognized:hologram"]);

        let docs = &groups[&ChangeGroup::Known(ChangeKind::Document)];
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_report_completeness() {
        let mut report = UndoReport::default();
        assert!(report.is_complete());
        report.note_failure("undo x".into(), &BackendError::RateLimited("429".into()));
        assert_eq!(report.rate_limited, 1);
        assert!(!report.is_complete());
    }
}
