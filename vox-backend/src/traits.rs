//! Backend Service Traits
//!
//! Defines the interface of the backend platform as consumed by VoxCampus.
//! Implementations are replaceable: in-memory for tests, REST for the real
//! platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use vox_core::PreferenceBag;

use crate::error::{BackendError, BackendResult};

/// Document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a caller-chosen id
    async fn create_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document>;

    /// Fetch a document
    async fn get_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> BackendResult<Document>;

    /// Patch fields of an existing document
    async fn update_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document>;

    /// Delete a document
    async fn delete_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> BackendResult<()>;

    /// List documents matching all filter queries
    async fn list_documents(
        &self,
        database_id: &str,
        collection: &str,
        queries: &[Query],
    ) -> BackendResult<DocumentList>;

    /// Create a collection. Usually needs an administrative credential.
    async fn create_collection(&self, database_id: &str, collection: &str) -> BackendResult<()> {
        Err(BackendError::Unsupported(format!(
            "create_collection {}/{}",
            database_id, collection
        )))
    }
}

/// Blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a file
    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<FileInfo>;

    /// Delete a file
    async fn delete_file(&self, bucket: &str, file_id: &str) -> BackendResult<()>;

    /// Read file content
    async fn get_file_view(&self, bucket: &str, file_id: &str) -> BackendResult<Vec<u8>>;
}

/// Account and session service
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Authenticate with email and password
    async fn create_session(&self, email: &str, password: &str) -> BackendResult<Session>;

    /// Terminate the current session
    async fn delete_session(&self) -> BackendResult<()>;

    /// Current identity
    async fn get(&self) -> BackendResult<Account>;

    /// Current preference bag
    async fn get_prefs(&self) -> BackendResult<PreferenceBag>;

    /// Replace the preference bag
    async fn update_prefs(&self, prefs: PreferenceBag) -> BackendResult<PreferenceBag>;
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub database_id: String,
    pub collection: String,
    pub created_at: Option<DateTime<Utc>>,
    /// User fields (system `$` attributes stripped)
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// One page of a list call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentList {
    /// Total matches, ignoring limit/offset
    pub total: u64,
    pub documents: Vec<Document>,
}

/// Uploaded file metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub bucket: String,
    pub name: String,
    pub size_bytes: u64,
}

/// Authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    /// Session secret, when the platform hands one out
    pub secret: Option<String>,
}

/// Account identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
}

/// List query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal(String, Value),
    NotEqual(String, Value),
    LessThan(String, Value),
    GreaterThan(String, Value),
    OrderAsc(String),
    Limit(usize),
    Offset(usize),
}

impl Query {
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Query::Equal(attribute.to_string(), value.into())
    }

    pub fn not_equal(attribute: &str, value: impl Into<Value>) -> Self {
        Query::NotEqual(attribute.to_string(), value.into())
    }

    pub fn less_than(attribute: &str, value: impl Into<Value>) -> Self {
        Query::LessThan(attribute.to_string(), value.into())
    }

    pub fn greater_than(attribute: &str, value: impl Into<Value>) -> Self {
        Query::GreaterThan(attribute.to_string(), value.into())
    }

    pub fn order_asc(attribute: &str) -> Self {
        Query::OrderAsc(attribute.to_string())
    }

    pub fn limit(n: usize) -> Self {
        Query::Limit(n)
    }

    pub fn offset(n: usize) -> Self {
        Query::Offset(n)
    }

    /// JSON query string in the platform's `queries[]` format
    pub fn to_wire(&self) -> String {
        let value = match self {
            Query::Equal(attr, v) => json!({ "method": "equal", "attribute": attr, "values": [v] }),
            Query::NotEqual(attr, v) => {
                json!({ "method": "notEqual", "attribute": attr, "values": [v] })
            }
            Query::LessThan(attr, v) => {
                json!({ "method": "lessThan", "attribute": attr, "values": [v] })
            }
            Query::GreaterThan(attr, v) => {
                json!({ "method": "greaterThan", "attribute": attr, "values": [v] })
            }
            Query::OrderAsc(attr) => json!({ "method": "orderAsc", "attribute": attr }),
            Query::Limit(n) => json!({ "method": "limit", "values": [n] }),
            Query::Offset(n) => json!({ "method": "offset", "values": [n] }),
        };
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_wire_format() {
        let q: Value = serde_json::from_str(&Query::equal("ownerEmail", "demo@x").to_wire()).unwrap();
        assert_eq!(q["method"], "equal");
        assert_eq!(q["attribute"], "ownerEmail");
        assert_eq!(q["values"][0], "demo@x");

        let q: Value = serde_json::from_str(&Query::limit(25).to_wire()).unwrap();
        assert_eq!(q["method"], "limit");
        assert_eq!(q["values"][0], 25);
    }
}
