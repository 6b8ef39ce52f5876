//! Tracking Store
//!
//! The collection holding one TrackedChange document per mutation made by the
//! demo identity. Records are append-only; they are only ever created here
//! and deleted by the undo engine or housekeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use vox_backend::Query;
use vox_core::{change_fields, format_timestamp, ChangeId, StoredChange, TrackedChange};

use crate::config::DemoConfig;
use crate::error::DemoResult;
use crate::gateway::Gateway;

/// Outcome of the tracking store existence check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreStatus {
    /// Collection answered the existence check
    Ready,
    /// Collection was missing and has been created
    Created,
    /// Collection could not be confirmed; tracking will be best-effort
    Unavailable { reason: String },
}

impl StoreStatus {
    pub fn is_usable(&self) -> bool {
        !matches!(self, StoreStatus::Unavailable { .. })
    }
}

/// Tracking collection access
#[derive(Clone)]
pub struct TrackingStore {
    gateway: Gateway,
    database_id: String,
    collection: String,
    page_size: usize,
}

impl TrackingStore {
    pub fn new(gateway: Gateway, config: &DemoConfig) -> Self {
        Self {
            gateway,
            database_id: config.database_id.clone(),
            collection: config.tracking_collection.clone(),
            page_size: config.page_size.max(1),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Check the collection with a one-row list; create it when missing.
    ///
    /// Never fails: any problem is logged and reported as `Unavailable`.
    pub async fn ensure_exists(&self) -> StoreStatus {
        let check = self
            .gateway
            .list_documents(&self.database_id, &self.collection, &[Query::limit(1)])
            .await;

        let status = match check {
            Ok(_) => StoreStatus::Ready,
            Err(e) if e.is_not_found() => {
                info!(collection = %self.collection, "Tracking collection missing, creating it");
                match self
                    .gateway
                    .create_collection(&self.database_id, &self.collection)
                    .await
                {
                    Ok(()) => StoreStatus::Created,
                    Err(e) => StoreStatus::Unavailable {
                        reason: format!("create failed: {}", e),
                    },
                }
            }
            Err(e) => StoreStatus::Unavailable {
                reason: e.to_string(),
            },
        };

        if let StoreStatus::Unavailable { reason } = &status {
            warn!(collection = %self.collection, reason = %reason, "Tracking collection unavailable");
        }
        status
    }

    /// Persist one record, using its id as the document id
    pub async fn insert(&self, change: &TrackedChange) -> DemoResult<ChangeId> {
        self.gateway
            .create_document(
                &self.database_id,
                &self.collection,
                change.id.as_str(),
                change.to_fields(),
            )
            .await?;
        debug!(change_id = %change.id, kind = %change.kind(), "Tracked change recorded");
        Ok(change.id.clone())
    }

    /// All records owned by `owner_email`, oldest first
    pub async fn list_outstanding(&self, owner_email: &str) -> DemoResult<Vec<StoredChange>> {
        self.list_all(vec![
            Query::equal(change_fields::OWNER_EMAIL, owner_email),
            Query::order_asc(change_fields::CREATED_AT),
        ])
        .await
    }

    /// Records of any owner created before `cutoff`
    pub async fn list_expired(&self, cutoff: DateTime<Utc>) -> DemoResult<Vec<StoredChange>> {
        self.list_all(vec![
            Query::less_than(change_fields::CREATED_AT, format_timestamp(&cutoff)),
            Query::order_asc(change_fields::CREATED_AT),
        ])
        .await
    }

    /// Number of records owned by `owner_email`
    pub async fn count_outstanding(&self, owner_email: &str) -> DemoResult<u64> {
        let page = self
            .gateway
            .list_documents(
                &self.database_id,
                &self.collection,
                &[
                    Query::equal(change_fields::OWNER_EMAIL, owner_email),
                    Query::limit(1),
                ],
            )
            .await?;
        Ok(page.total)
    }

    /// Outstanding record counts keyed by change kind tag
    pub async fn outstanding_by_kind(
        &self,
        owner_email: &str,
    ) -> DemoResult<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for record in self.list_outstanding(owner_email).await? {
            *counts.entry(record.kind_label().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Delete one record. A record that is already gone counts as deleted.
    pub async fn delete_record(&self, id: &ChangeId) -> DemoResult<()> {
        match self
            .gateway
            .delete_document(&self.database_id, &self.collection, id.as_str())
            .await
        {
            Err(e) if e.is_not_found() => {
                debug!(change_id = %id, "Tracking record already gone");
                Ok(())
            }
            other => Ok(other?),
        }
    }

    async fn list_all(&self, filters: Vec<Query>) -> DemoResult<Vec<StoredChange>> {
        let mut records = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut queries = filters.clone();
            queries.push(Query::limit(self.page_size));
            queries.push(Query::offset(offset));

            let page = self
                .gateway
                .list_documents(&self.database_id, &self.collection, &queries)
                .await?;
            // Adapters may drop malformed rows, so the page length is not
            // a reliable cursor
            offset += self.page_size;

            records.extend(
                page.documents
                    .iter()
                    .map(|doc| StoredChange::from_fields(&doc.id, &doc.fields)),
            );

            if offset as u64 >= page.total {
                break;
            }
        }

        debug!(collection = %self.collection, count = records.len(), "Listed tracking records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Platform;
    use crate::throttle::Throttle;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::Arc;
    use vox_backend::{
        BackendResult, Document, DocumentList, DocumentStore, Fault, FaultKind, MemoryBackend,
        Operation,
    };
    use vox_core::{ChangeTarget, DocumentRef, DEMO_EMAIL};

    fn store(backend: &Arc<MemoryBackend>, page_size: usize) -> TrackingStore {
        let gateway = Gateway::new(
            Platform::from_backend(backend.clone()),
            Arc::new(Throttle::unlimited()),
        );
        TrackingStore::new(gateway, &DemoConfig::test().with_page_size(page_size))
    }

    fn doc_change(owner: &str, doc_id: &str) -> TrackedChange {
        TrackedChange::new(
            ChangeTarget::Document(DocumentRef::new("voxcampus", "posts", doc_id)),
            owner,
        )
    }

    #[tokio::test]
    async fn test_list_outstanding_pages_through_everything() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(&backend, 7);

        for i in 0..30 {
            store.insert(&doc_change(DEMO_EMAIL, &format!("p{}", i))).await.unwrap();
        }
        store.insert(&doc_change("someone@else.edu", "x")).await.unwrap();

        let records = store.list_outstanding(DEMO_EMAIL).await.unwrap();
        assert_eq!(records.len(), 30);
        assert_eq!(store.count_outstanding(DEMO_EMAIL).await.unwrap(), 30);
        // Five pages of at most 7, plus the count query
        assert_eq!(backend.calls_for(Operation::ListDocuments).await.len(), 6);
    }

    /// Hides one document from every listing while keeping the total, the
    /// way the REST adapter skips a row it cannot parse
    struct HidingStore {
        inner: Arc<MemoryBackend>,
        hidden: String,
    }

    #[async_trait]
    impl DocumentStore for HidingStore {
        async fn create_document(
            &self,
            database_id: &str,
            collection: &str,
            document_id: &str,
            data: Map<String, Value>,
        ) -> BackendResult<Document> {
            self.inner
                .create_document(database_id, collection, document_id, data)
                .await
        }

        async fn get_document(
            &self,
            database_id: &str,
            collection: &str,
            document_id: &str,
        ) -> BackendResult<Document> {
            self.inner.get_document(database_id, collection, document_id).await
        }

        async fn update_document(
            &self,
            database_id: &str,
            collection: &str,
            document_id: &str,
            data: Map<String, Value>,
        ) -> BackendResult<Document> {
            self.inner
                .update_document(database_id, collection, document_id, data)
                .await
        }

        async fn delete_document(
            &self,
            database_id: &str,
            collection: &str,
            document_id: &str,
        ) -> BackendResult<()> {
            self.inner.delete_document(database_id, collection, document_id).await
        }

        async fn list_documents(
            &self,
            database_id: &str,
            collection: &str,
            queries: &[Query],
        ) -> BackendResult<DocumentList> {
            let mut page = self.inner.list_documents(database_id, collection, queries).await?;
            page.documents.retain(|doc| doc.id != self.hidden);
            Ok(page)
        }
    }

    #[tokio::test]
    async fn test_dropped_row_does_not_shift_later_pages() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = store(&backend, 7);

        let mut ids = Vec::new();
        for i in 0..30 {
            let change = doc_change(DEMO_EMAIL, &format!("p{}", i));
            writer.insert(&change).await.unwrap();
            ids.push(change.id.as_str().to_string());
        }

        let hiding = Arc::new(HidingStore {
            inner: backend.clone(),
            hidden: ids[3].clone(),
        });
        let platform = Platform::new(hiding, backend.clone(), backend.clone());
        let reader = TrackingStore::new(
            Gateway::new(platform, Arc::new(Throttle::unlimited())),
            &DemoConfig::test().with_page_size(7),
        );

        let records = reader.list_outstanding(DEMO_EMAIL).await.unwrap();
        let mut seen: Vec<String> = records.iter().map(|r| r.id().as_str().to_string()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(records.len(), 29);
        assert_eq!(seen.len(), 29);
        assert!(!seen.contains(&ids[3]));
    }

    #[tokio::test]
    async fn test_ensure_exists_creates_missing_collection() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_strict_collections(true).await;
        let store = store(&backend, 100);

        assert_eq!(store.ensure_exists().await, StoreStatus::Created);
        assert_eq!(store.ensure_exists().await, StoreStatus::Ready);
    }

    #[tokio::test]
    async fn test_ensure_exists_reports_unavailable() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .inject(Fault::new(Operation::ListDocuments, FaultKind::Unauthorized))
            .await;
        let store = store(&backend, 100);

        let status = store.ensure_exists().await;
        assert!(!status.is_usable());
    }

    #[tokio::test]
    async fn test_delete_missing_record_is_ok() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(&backend, 100);
        let change = doc_change(DEMO_EMAIL, "p1");
        store.insert(&change).await.unwrap();

        store.delete_record(&change.id).await.unwrap();
        store.delete_record(&change.id).await.unwrap();
        assert_eq!(store.count_outstanding(DEMO_EMAIL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_kinds_are_listed_as_unrecognized() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(&backend, 100);
        let mut fields = doc_change(DEMO_EMAIL, "p1").to_fields();
        fields.insert(change_fields::CHANGE_KIND.into(), "hologram".into());
        backend
            .create_document("voxcampus", store.collection(), "weird", fields)
            .await
            .unwrap();

        let records = store.list_outstanding(DEMO_EMAIL).await.unwrap();
        assert!(matches!(records[0], StoredChange::Unrecognized { .. }));
        let by_kind = store.outstanding_by_kind(DEMO_EMAIL).await.unwrap();
        assert_eq!(by_kind.get("hologram"), Some(&1));
    }
}
