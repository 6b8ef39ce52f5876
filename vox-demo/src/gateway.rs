//! Throttled backend access
//!
//! Every backend call made on behalf of the demo identity goes through a
//! `Gateway`, which takes a throttle token before delegating to the platform.

use serde_json::{Map, Value};
use std::sync::Arc;
use vox_backend::{
    Account, AccountService, BackendResult, BlobStore, Document, DocumentList, DocumentStore,
    FileInfo, Query, Session,
};
use vox_core::PreferenceBag;

use crate::throttle::Throttle;

/// The three platform services
#[derive(Clone)]
pub struct Platform {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub account: Arc<dyn AccountService>,
}

impl Platform {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        account: Arc<dyn AccountService>,
    ) -> Self {
        Self {
            documents,
            blobs,
            account,
        }
    }

    /// Use one backend for all three services
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: DocumentStore + BlobStore + AccountService + 'static,
    {
        Self {
            documents: backend.clone(),
            blobs: backend.clone(),
            account: backend,
        }
    }
}

/// Throttled view of the platform
#[derive(Clone)]
pub struct Gateway {
    platform: Platform,
    throttle: Arc<Throttle>,
}

impl Gateway {
    pub fn new(platform: Platform, throttle: Arc<Throttle>) -> Self {
        Self { platform, throttle }
    }

    pub fn throttle(&self) -> &Arc<Throttle> {
        &self.throttle
    }

    pub async fn create_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        self.throttle.acquire().await;
        self.platform
            .documents
            .create_document(database_id, collection, document_id, data)
            .await
    }

    pub async fn update_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        self.throttle.acquire().await;
        self.platform
            .documents
            .update_document(database_id, collection, document_id, data)
            .await
    }

    pub async fn delete_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> BackendResult<()> {
        self.throttle.acquire().await;
        self.platform
            .documents
            .delete_document(database_id, collection, document_id)
            .await
    }

    pub async fn list_documents(
        &self,
        database_id: &str,
        collection: &str,
        queries: &[Query],
    ) -> BackendResult<DocumentList> {
        self.throttle.acquire().await;
        self.platform
            .documents
            .list_documents(database_id, collection, queries)
            .await
    }

    pub async fn create_collection(&self, database_id: &str, collection: &str) -> BackendResult<()> {
        self.throttle.acquire().await;
        self.platform
            .documents
            .create_collection(database_id, collection)
            .await
    }

    pub async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<FileInfo> {
        self.throttle.acquire().await;
        self.platform
            .blobs
            .create_file(bucket, file_id, name, bytes)
            .await
    }

    pub async fn delete_file(&self, bucket: &str, file_id: &str) -> BackendResult<()> {
        self.throttle.acquire().await;
        self.platform.blobs.delete_file(bucket, file_id).await
    }

    pub async fn create_session(&self, email: &str, password: &str) -> BackendResult<Session> {
        self.throttle.acquire().await;
        self.platform.account.create_session(email, password).await
    }

    pub async fn delete_session(&self) -> BackendResult<()> {
        self.throttle.acquire().await;
        self.platform.account.delete_session().await
    }

    pub async fn current_account(&self) -> BackendResult<Account> {
        self.throttle.acquire().await;
        self.platform.account.get().await
    }

    pub async fn get_prefs(&self) -> BackendResult<PreferenceBag> {
        self.throttle.acquire().await;
        self.platform.account.get_prefs().await
    }

    pub async fn update_prefs(&self, prefs: PreferenceBag) -> BackendResult<PreferenceBag> {
        self.throttle.acquire().await;
        self.platform.account.update_prefs(prefs).await
    }
}
