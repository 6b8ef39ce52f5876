//! In-Memory Backend
//!
//! Implements all three platform services in process. Used by tests and local
//! development.
//!
//! Besides plain storage it can:
//! - inject failures per operation and collection/bucket (`Fault`)
//! - add per-call latency, so overlapping calls become observable
//! - record every call with start/finish instants and track the peak number of
//!   calls in flight
//! - require an authenticated session for data operations, like the real
//!   platform does for a non-admin client

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use vox_core::{format_timestamp, PreferenceBag};

use crate::error::{BackendError, BackendResult};
use crate::traits::{
    Account, AccountService, BlobStore, Document, DocumentList, DocumentStore, FileInfo, Query,
    Session,
};

/// Page size applied when a list call carries no limit
pub const DEFAULT_LIST_LIMIT: usize = 25;

/// Backend operation, for fault injection and the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateDocument,
    GetDocument,
    UpdateDocument,
    DeleteDocument,
    ListDocuments,
    CreateCollection,
    CreateFile,
    DeleteFile,
    GetFileView,
    CreateSession,
    DeleteSession,
    GetAccount,
    GetPrefs,
    UpdatePrefs,
}

impl Operation {
    fn needs_session(&self) -> bool {
        !matches!(self, Operation::CreateSession | Operation::CreateCollection)
    }

    /// Deletes of undo targets
    pub fn is_delete(&self) -> bool {
        matches!(self, Operation::DeleteDocument | Operation::DeleteFile)
    }
}

/// Injected failure flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    RateLimited,
    Network,
    Unauthorized,
    NotFound,
}

impl FaultKind {
    fn to_error(self, op: Operation, scope: &str) -> BackendError {
        let context = format!("injected {:?} on {}", op, scope);
        match self {
            FaultKind::RateLimited => BackendError::RateLimited(context),
            FaultKind::Network => BackendError::Network(context),
            FaultKind::Unauthorized => BackendError::Unauthorized(context),
            FaultKind::NotFound => BackendError::NotFound(context),
        }
    }
}

/// Injected failure
#[derive(Debug, Clone)]
pub struct Fault {
    pub op: Operation,
    /// Collection or bucket to match; any when None
    pub scope: Option<String>,
    pub kind: FaultKind,
    /// Number of calls to fail; every call when None
    pub remaining: Option<u32>,
    /// Matching calls to let through before failing
    pub skip: u32,
}

impl Fault {
    pub fn new(op: Operation, kind: FaultKind) -> Self {
        Self {
            op,
            scope: None,
            kind,
            remaining: None,
            skip: 0,
        }
    }

    /// Only fail calls against this collection or bucket
    pub fn on(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Only fail the next `n` matching calls
    pub fn times(mut self, n: u32) -> Self {
        self.remaining = Some(n);
        self
    }

    /// Let the first `n` matching calls succeed
    pub fn after(mut self, n: u32) -> Self {
        self.skip = n;
        self
    }

    fn matches(&self, op: Operation, scope: &str) -> bool {
        self.op == op
            && self.scope.as_deref().map_or(true, |s| s == scope)
            && self.remaining != Some(0)
    }
}

/// One recorded backend call
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub op: Operation,
    /// Collection, bucket or email the call addressed
    pub scope: String,
    /// Document or file id, when the call addressed one
    pub object: Option<String>,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub ok: bool,
}

impl CallRecord {
    /// Whether the two calls were executing at the same time
    pub fn overlaps(&self, other: &CallRecord) -> bool {
        self.started_at < other.finished_at && other.started_at < self.finished_at
    }
}

#[derive(Debug, Clone)]
struct UserRecord {
    user_id: String,
    email: String,
    password: String,
    name: Option<String>,
    prefs: PreferenceBag,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<(String, String), BTreeMap<String, Document>>,
    files: HashMap<(String, String), (FileInfo, Vec<u8>)>,
    users: HashMap<String, UserRecord>,
    /// (session id, email)
    session: Option<(String, String)>,
    faults: Vec<Fault>,
    calls: Vec<CallRecord>,
    require_session: bool,
    strict_collections: bool,
    declared: HashSet<(String, String)>,
}

impl State {
    fn take_fault(&mut self, op: Operation, scope: &str) -> Option<BackendError> {
        let fault = self.faults.iter_mut().find(|f| f.matches(op, scope))?;
        if fault.skip > 0 {
            fault.skip -= 1;
            return None;
        }
        if let Some(n) = fault.remaining.as_mut() {
            *n -= 1;
        }
        Some(fault.kind.to_error(op, scope))
    }

    fn current_user(&mut self) -> BackendResult<&mut UserRecord> {
        let email = self
            .session
            .as_ref()
            .map(|(_, email)| email.clone())
            .ok_or_else(|| BackendError::Unauthorized("No active session".to_string()))?;
        self.users
            .get_mut(&email)
            .ok_or_else(|| BackendError::Unauthorized(format!("Unknown account {}", email)))
    }

    fn collection_exists(&self, database_id: &str, collection: &str) -> bool {
        let key = (database_id.to_string(), collection.to_string());
        !self.strict_collections || self.declared.contains(&key)
    }

    fn collection_mut(
        &mut self,
        database_id: &str,
        collection: &str,
    ) -> BackendResult<&mut BTreeMap<String, Document>> {
        if !self.collection_exists(database_id, collection) {
            return Err(BackendError::NotFound(format!(
                "Collection {}/{} not found",
                database_id, collection
            )));
        }
        Ok(self
            .collections
            .entry((database_id.to_string(), collection.to_string()))
            .or_default())
    }
}

/// In-memory platform
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<State>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Register an account that can log in
    pub async fn register_account(&self, email: &str, password: &str, name: Option<&str>) -> String {
        let user_id = format!("user_{}", uuid::Uuid::new_v4().simple());
        let key = email.trim().to_ascii_lowercase();
        self.state.lock().await.users.insert(
            key.clone(),
            UserRecord {
                user_id: user_id.clone(),
                email: key,
                password: password.to_string(),
                name: name.map(str::to_string),
                prefs: PreferenceBag::new(),
            },
        );
        user_id
    }

    /// Reject data operations when nobody is logged in
    pub async fn set_require_session(&self, required: bool) {
        self.state.lock().await.require_session = required;
    }

    /// Only collections created through `create_collection` exist
    pub async fn set_strict_collections(&self, strict: bool) {
        self.state.lock().await.strict_collections = strict;
    }

    pub async fn inject(&self, fault: Fault) {
        self.state.lock().await.faults.push(fault);
    }

    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    /// Every call made so far, in completion order
    pub async fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().await.calls.clone()
    }

    pub async fn calls_for(&self, op: Operation) -> Vec<CallRecord> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
        self.max_in_flight.store(0, AtomicOrdering::SeqCst);
    }

    /// Highest number of calls ever executing at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(AtomicOrdering::SeqCst)
    }

    pub async fn documents(&self, database_id: &str, collection: &str) -> Vec<Document> {
        self.state
            .lock()
            .await
            .collections
            .get(&(database_id.to_string(), collection.to_string()))
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn document_count(&self, database_id: &str, collection: &str) -> usize {
        self.documents(database_id, collection).await.len()
    }

    pub async fn has_file(&self, bucket: &str, file_id: &str) -> bool {
        self.state
            .lock()
            .await
            .files
            .contains_key(&(bucket.to_string(), file_id.to_string()))
    }

    pub async fn has_collection(&self, database_id: &str, collection: &str) -> bool {
        self.state
            .lock()
            .await
            .collection_exists(database_id, collection)
    }

    /// Preferences of any account, bypassing sessions
    pub async fn prefs_of(&self, email: &str) -> Option<PreferenceBag> {
        self.state
            .lock()
            .await
            .users
            .get(&email.trim().to_ascii_lowercase())
            .map(|u| u.prefs.clone())
    }

    /// Whether a session is currently active
    pub async fn has_session(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    async fn call<T>(
        &self,
        op: Operation,
        scope: &str,
        object: Option<&str>,
        f: impl FnOnce(&mut State) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let started_at = Instant::now();
        let now_in_flight = self.in_flight.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.max_in_flight
            .fetch_max(now_in_flight, AtomicOrdering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock().await;
        let result = match state.take_fault(op, scope) {
            Some(err) => Err(err),
            None if state.require_session && op.needs_session() && state.session.is_none() => Err(
                BackendError::Unauthorized(format!("{:?} requires a session", op)),
            ),
            None => f(&mut state),
        };

        self.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
        state.calls.push(CallRecord {
            op,
            scope: scope.to_string(),
            object: object.map(str::to_string),
            started_at,
            finished_at: Instant::now(),
            ok: result.is_ok(),
        });

        if let Err(e) = &result {
            debug!(op = ?op, scope = %scope, error = %e, "Memory backend call failed");
        }
        result
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn create_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        self.call(Operation::CreateDocument, collection, Some(document_id), |state| {
            let docs = state.collection_mut(database_id, collection)?;
            if docs.contains_key(document_id) {
                return Err(BackendError::Conflict(format!(
                    "Document {} already exists",
                    document_id
                )));
            }
            let doc = Document {
                id: document_id.to_string(),
                database_id: database_id.to_string(),
                collection: collection.to_string(),
                created_at: Some(Utc::now()),
                fields: data,
            };
            docs.insert(document_id.to_string(), doc.clone());
            Ok(doc)
        })
        .await
    }

    async fn get_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> BackendResult<Document> {
        self.call(Operation::GetDocument, collection, Some(document_id), |state| {
            state
                .collection_mut(database_id, collection)?
                .get(document_id)
                .cloned()
                .ok_or_else(|| BackendError::NotFound(format!("Document {} not found", document_id)))
        })
        .await
    }

    async fn update_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        self.call(Operation::UpdateDocument, collection, Some(document_id), |state| {
            let doc = state
                .collection_mut(database_id, collection)?
                .get_mut(document_id)
                .ok_or_else(|| {
                    BackendError::NotFound(format!("Document {} not found", document_id))
                })?;
            for (k, v) in data {
                doc.fields.insert(k, v);
            }
            Ok(doc.clone())
        })
        .await
    }

    async fn delete_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> BackendResult<()> {
        self.call(Operation::DeleteDocument, collection, Some(document_id), |state| {
            state
                .collection_mut(database_id, collection)?
                .remove(document_id)
                .map(|_| ())
                .ok_or_else(|| BackendError::NotFound(format!("Document {} not found", document_id)))
        })
        .await
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection: &str,
        queries: &[Query],
    ) -> BackendResult<DocumentList> {
        self.call(Operation::ListDocuments, collection, None, |state| {
            let docs = state.collection_mut(database_id, collection)?;
            let mut matched: Vec<Document> = docs
                .values()
                .filter(|doc| queries.iter().all(|q| query_matches(doc, q)))
                .cloned()
                .collect();

            for q in queries {
                if let Query::OrderAsc(attr) = q {
                    matched.sort_by(|a, b| {
                        match (field_value(a, attr), field_value(b, attr)) {
                            (Some(x), Some(y)) => compare_values(&x, &y).unwrap_or(Ordering::Equal),
                            (None, Some(_)) => Ordering::Less,
                            (Some(_), None) => Ordering::Greater,
                            (None, None) => Ordering::Equal,
                        }
                    });
                }
            }

            let total = matched.len() as u64;
            let offset = queries
                .iter()
                .find_map(|q| match q {
                    Query::Offset(n) => Some(*n),
                    _ => None,
                })
                .unwrap_or(0);
            let limit = queries
                .iter()
                .find_map(|q| match q {
                    Query::Limit(n) => Some(*n),
                    _ => None,
                })
                .unwrap_or(DEFAULT_LIST_LIMIT);

            Ok(DocumentList {
                total,
                documents: matched.into_iter().skip(offset).take(limit).collect(),
            })
        })
        .await
    }

    async fn create_collection(&self, database_id: &str, collection: &str) -> BackendResult<()> {
        self.call(Operation::CreateCollection, collection, None, |state| {
            let key = (database_id.to_string(), collection.to_string());
            if !state.declared.insert(key.clone()) {
                return Err(BackendError::Conflict(format!(
                    "Collection {}/{} already exists",
                    database_id, collection
                )));
            }
            state.collections.entry(key).or_default();
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<FileInfo> {
        self.call(Operation::CreateFile, bucket, Some(file_id), |state| {
            let key = (bucket.to_string(), file_id.to_string());
            if state.files.contains_key(&key) {
                return Err(BackendError::Conflict(format!("File {} already exists", file_id)));
            }
            let info = FileInfo {
                id: file_id.to_string(),
                bucket: bucket.to_string(),
                name: name.to_string(),
                size_bytes: bytes.len() as u64,
            };
            state.files.insert(key, (info.clone(), bytes));
            Ok(info)
        })
        .await
    }

    async fn delete_file(&self, bucket: &str, file_id: &str) -> BackendResult<()> {
        self.call(Operation::DeleteFile, bucket, Some(file_id), |state| {
            state
                .files
                .remove(&(bucket.to_string(), file_id.to_string()))
                .map(|_| ())
                .ok_or_else(|| BackendError::NotFound(format!("File {} not found", file_id)))
        })
        .await
    }

    async fn get_file_view(&self, bucket: &str, file_id: &str) -> BackendResult<Vec<u8>> {
        self.call(Operation::GetFileView, bucket, Some(file_id), |state| {
            state
                .files
                .get(&(bucket.to_string(), file_id.to_string()))
                .map(|(_, bytes)| bytes.clone())
                .ok_or_else(|| BackendError::NotFound(format!("File {} not found", file_id)))
        })
        .await
    }
}

#[async_trait]
impl AccountService for MemoryBackend {
    async fn create_session(&self, email: &str, password: &str) -> BackendResult<Session> {
        let key = email.trim().to_ascii_lowercase();
        self.call(Operation::CreateSession, &key.clone(), None, move |state| {
            let user = state
                .users
                .get(&key)
                .filter(|u| u.password == password)
                .ok_or_else(|| BackendError::Unauthorized("Invalid credentials".to_string()))?;
            let session = Session {
                id: format!("session_{}", uuid::Uuid::new_v4().simple()),
                user_id: user.user_id.clone(),
                secret: None,
            };
            state.session = Some((session.id.clone(), key));
            Ok(session)
        })
        .await
    }

    async fn delete_session(&self) -> BackendResult<()> {
        self.call(Operation::DeleteSession, "account", None, |state| {
            state
                .session
                .take()
                .map(|_| ())
                .ok_or_else(|| BackendError::Unauthorized("No active session".to_string()))
        })
        .await
    }

    async fn get(&self) -> BackendResult<Account> {
        self.call(Operation::GetAccount, "account", None, |state| {
            let user = state.current_user()?;
            Ok(Account {
                user_id: user.user_id.clone(),
                email: user.email.clone(),
                name: user.name.clone(),
            })
        })
        .await
    }

    async fn get_prefs(&self) -> BackendResult<PreferenceBag> {
        self.call(Operation::GetPrefs, "account", None, |state| {
            Ok(state.current_user()?.prefs.clone())
        })
        .await
    }

    async fn update_prefs(&self, prefs: PreferenceBag) -> BackendResult<PreferenceBag> {
        self.call(Operation::UpdatePrefs, "account", None, move |state| {
            let user = state.current_user()?;
            user.prefs = prefs;
            Ok(user.prefs.clone())
        })
        .await
    }
}

fn field_value(doc: &Document, attribute: &str) -> Option<Value> {
    match attribute {
        "$id" => Some(Value::String(doc.id.clone())),
        "$createdAt" => doc
            .created_at
            .as_ref()
            .map(|ts| Value::String(format_timestamp(ts))),
        _ => doc.fields.get(attribute).cloned(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn query_matches(doc: &Document, query: &Query) -> bool {
    match query {
        Query::Equal(attr, v) => field_value(doc, attr).as_ref() == Some(v),
        Query::NotEqual(attr, v) => field_value(doc, attr).as_ref() != Some(v),
        Query::LessThan(attr, v) => field_value(doc, attr)
            .and_then(|x| compare_values(&x, v))
            .map_or(false, |o| o == Ordering::Less),
        Query::GreaterThan(attr, v) => field_value(doc, attr)
            .and_then(|x| compare_values(&x, v))
            .map_or(false, |o| o == Ordering::Greater),
        Query::OrderAsc(_) | Query::Limit(_) | Query::Offset(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_document_crud() {
        let backend = MemoryBackend::new();
        backend
            .create_document("db", "comments", "c1", fields(json!({ "body": "hi" })))
            .await
            .unwrap();

        let err = backend
            .create_document("db", "comments", "c1", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));

        let doc = backend
            .update_document("db", "comments", "c1", fields(json!({ "likes": 2 })))
            .await
            .unwrap();
        assert_eq!(doc.get_str("body"), Some("hi"));
        assert_eq!(doc.fields["likes"], json!(2));

        backend.delete_document("db", "comments", "c1").await.unwrap();
        let err = backend.get_document("db", "comments", "c1").await.unwrap_err();
        assert!(err.is_not_found());
        let err = backend.delete_document("db", "comments", "c1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let backend = MemoryBackend::new();
        for i in 0..30 {
            let owner = if i % 3 == 0 { "other@x" } else { "demo@x" };
            backend
                .create_document(
                    "db",
                    "tracked",
                    &format!("t{:02}", i),
                    fields(json!({ "ownerEmail": owner, "n": i })),
                )
                .await
                .unwrap();
        }

        let page = backend
            .list_documents("db", "tracked", &[Query::equal("ownerEmail", "demo@x")])
            .await
            .unwrap();
        assert_eq!(page.total, 20);
        assert_eq!(page.documents.len(), DEFAULT_LIST_LIMIT.min(20));

        let page = backend
            .list_documents(
                "db",
                "tracked",
                &[
                    Query::less_than("n", 10),
                    Query::limit(4),
                    Query::offset(8),
                ],
            )
            .await
            .unwrap();
        assert_eq!(page.total, 10);
        assert_eq!(page.documents.len(), 2);
    }

    #[tokio::test]
    async fn test_fault_injection_counts_down() {
        let backend = MemoryBackend::new();
        backend
            .inject(
                Fault::new(Operation::CreateDocument, FaultKind::RateLimited)
                    .on("tracked")
                    .times(1),
            )
            .await;

        let err = backend
            .create_document("db", "tracked", "t1", Map::new())
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());

        // Other collections are unaffected, and the fault is spent
        backend.create_document("db", "comments", "c1", Map::new()).await.unwrap();
        backend.create_document("db", "tracked", "t1", Map::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_sessions_and_prefs() {
        let backend = MemoryBackend::new();
        backend.register_account("demo@x", "pw", Some("Demo")).await;
        backend.set_require_session(true).await;

        assert!(backend.get_prefs().await.is_err());
        assert!(backend.create_session("demo@x", "wrong").await.is_err());

        backend.create_session("DEMO@x", "pw").await.unwrap();
        let account = backend.get().await.unwrap();
        assert_eq!(account.email, "demo@x");

        let prefs = PreferenceBag::new().with("theme", "dark");
        backend.update_prefs(prefs.clone()).await.unwrap();
        assert_eq!(backend.get_prefs().await.unwrap(), prefs);

        backend.delete_session().await.unwrap();
        assert!(!backend.has_session().await);
        assert!(backend.delete_session().await.is_err());
        assert_eq!(backend.prefs_of("demo@x").await, Some(prefs));
    }

    #[tokio::test]
    async fn test_strict_collections() {
        let backend = MemoryBackend::new();
        backend.set_strict_collections(true).await;

        let err = backend.list_documents("db", "tracked", &[]).await.unwrap_err();
        assert!(err.is_not_found());

        backend.create_collection("db", "tracked").await.unwrap();
        assert!(backend.has_collection("db", "tracked").await);
        assert!(backend.list_documents("db", "tracked", &[]).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_log_tracks_overlap() {
        let backend = MemoryBackend::new().with_latency(Duration::from_millis(10));
        let (a, b) = tokio::join!(
            backend.create_file("avatars", "f1", "a.png", vec![1]),
            backend.create_file("avatars", "f2", "b.png", vec![2]),
        );
        a.unwrap();
        b.unwrap();

        let calls = backend.calls_for(Operation::CreateFile).await;
        assert_eq!(calls.len(), 2);
        assert!(calls[0].overlaps(&calls[1]));
        assert_eq!(backend.max_in_flight(), 2);
    }
}
