//! Change Recorder
//!
//! Appends one TrackedChange per mutation made by the demo identity. Every
//! operation is best-effort: a failed write is logged and reported as `None`,
//! and the caller's mutation stands regardless.

use tracing::debug;
use vox_core::{ChangeId, ChangeTarget, DemoIdentity, DocumentRef, FileRef, RelationKind, TrackedChange};

use crate::error::LogAndDrop;
use crate::tracking::TrackingStore;

#[derive(Clone)]
pub struct ChangeRecorder {
    store: TrackingStore,
    identity: DemoIdentity,
}

impl ChangeRecorder {
    pub fn new(store: TrackingStore, identity: DemoIdentity) -> Self {
        Self { store, identity }
    }

    pub fn identity(&self) -> &DemoIdentity {
        &self.identity
    }

    /// A document was created or written
    pub async fn track_document_change(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> Option<ChangeId> {
        let target = ChangeTarget::Document(DocumentRef::new(database_id, collection, document_id));
        self.record(TrackedChange::new(target, self.identity.email()))
            .await
    }

    /// A file was uploaded
    pub async fn track_file_upload(&self, bucket: &str, file_id: &str) -> Option<ChangeId> {
        let target = ChangeTarget::File(FileRef::new(bucket, file_id));
        self.record(TrackedChange::new(target, self.identity.email()))
            .await
    }

    /// The profile of `user_id` was edited
    pub async fn track_profile_update(&self, user_id: &str) -> Option<ChangeId> {
        let target = ChangeTarget::Profile {
            user_id: user_id.to_string(),
        };
        self.record(TrackedChange::new(target, self.identity.email()))
            .await
    }

    /// A preference entry changed
    pub async fn track_preference_change(&self, pref_type: &str, data_type: &str) -> Option<ChangeId> {
        let target = ChangeTarget::Preference {
            pref_type: pref_type.to_string(),
            data_type: data_type.to_string(),
        };
        self.record(TrackedChange::new(target, self.identity.email()))
            .await
    }

    /// A relation document was created.
    ///
    /// `relation_tag` selects the change kind (`association`, `connection`,
    /// `follow`, `membership`); any other tag is recorded as a plain document
    /// change. The tag itself is always kept for diagnostics.
    pub async fn track_relation(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        relation_tag: &str,
    ) -> Option<ChangeId> {
        let document = DocumentRef::new(database_id, collection, document_id);
        let target = match RelationKind::from_tag(relation_tag) {
            Some(kind) => ChangeTarget::Relation { kind, document },
            None => {
                debug!(relation = %relation_tag, "Unknown relation tag, tracking as document");
                ChangeTarget::Document(document)
            }
        };
        let change =
            TrackedChange::new(target, self.identity.email()).with_relation_kind(relation_tag);
        self.record(change).await
    }

    async fn record(&self, change: TrackedChange) -> Option<ChangeId> {
        let context = format!("track {}", change.target);
        self.store.insert(&change).await.log_and_drop(&context)
    }
}
