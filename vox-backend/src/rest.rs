//! REST Backend
//!
//! HTTP client for an Appwrite-style REST API. Documents, files and the
//! account service are mapped onto their `/databases`, `/storage` and
//! `/account` routes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use vox_core::PreferenceBag;

use crate::config::RestConfig;
use crate::error::{BackendError, BackendResult};
use crate::traits::{
    Account, AccountService, BlobStore, Document, DocumentList, DocumentStore, FileInfo, Query,
    Session,
};

/// Error payload returned by the platform
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListBody {
    total: u64,
    documents: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct FileBody {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "bucketId")]
    bucket_id: String,
    name: String,
    #[serde(rename = "sizeOriginal", default)]
    size_original: u64,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(default)]
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountBody {
    #[serde(rename = "$id")]
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

/// Credential of the signed-in session, sent on every request once set
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionAuth {
    /// Session secret, returned when the call carried an API key
    Secret(String),
    /// `name=value` of the `a_session_*` cookie set by a plain sign-in
    Cookie(String),
}

/// REST client for the platform
pub struct RestBackend {
    client: Client,
    config: RestConfig,
    session: RwLock<Option<SessionAuth>>,
}

impl RestBackend {
    /// Create a new client
    pub fn new(config: RestConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Configuration(e.to_string()))?;
        Self::with_client(config, client)
    }

    /// Create a client on top of a preconfigured `reqwest::Client`
    pub fn with_client(config: RestConfig, client: Client) -> BackendResult<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            session: RwLock::new(None),
        })
    }

    /// Whether a session credential is held
    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let mut request = request.header("X-Appwrite-Project", &self.config.project_id);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-Appwrite-Key", key);
        }
        match self.session.read().await.as_ref() {
            Some(SessionAuth::Secret(secret)) => {
                request = request.header("X-Appwrite-Session", secret);
            }
            Some(SessionAuth::Cookie(cookie)) => {
                request = request.header(COOKIE, cookie);
            }
            None => {}
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        debug!(status = status.as_u16(), message = %message, "Backend request failed");
        Err(BackendError::from_status(status.as_u16(), message))
    }

    async fn send_json(&self, request: RequestBuilder) -> BackendResult<Value> {
        Ok(self.send(request).await?.json().await?)
    }
}

fn documents_path(database_id: &str, collection: &str) -> String {
    format!("/databases/{}/collections/{}/documents", database_id, collection)
}

fn files_path(bucket: &str) -> String {
    format!("/storage/buckets/{}/files", bucket)
}

/// The session cookie among `Set-Cookie` headers, as `name=value`.
/// The `_legacy` duplicate is ignored.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .find(|pair| match pair.split_once('=') {
            Some((name, value)) => {
                name.starts_with("a_session_") && !name.ends_with("_legacy") && !value.is_empty()
            }
            None => false,
        })
        .map(str::to_string)
}

fn query_params(queries: &[Query]) -> Vec<(&'static str, String)> {
    queries.iter().map(|q| ("queries[]", q.to_wire())).collect()
}

/// Split a wire document into system attributes and user fields
pub(crate) fn parse_document(
    database_id: &str,
    collection: &str,
    mut raw: Map<String, Value>,
) -> BackendResult<Document> {
    let id = match raw.remove("$id") {
        Some(Value::String(id)) => id,
        _ => {
            return Err(BackendError::Serialization(
                "document without $id".to_string(),
            ))
        }
    };
    let created_at = raw
        .get("$createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc));
    raw.retain(|key, _| !key.starts_with('$'));

    Ok(Document {
        id,
        database_id: database_id.to_string(),
        collection: collection.to_string(),
        created_at,
        fields: raw,
    })
}

fn into_object(value: Value) -> BackendResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Serialization(format!(
            "expected object, got {}",
            other
        ))),
    }
}

#[async_trait]
impl DocumentStore for RestBackend {
    async fn create_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        let url = self.url(&documents_path(database_id, collection));
        let body = json!({ "documentId": document_id, "data": data });
        let raw = self.send_json(self.client.post(&url).json(&body)).await?;
        parse_document(database_id, collection, into_object(raw)?)
    }

    async fn get_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> BackendResult<Document> {
        let url = self.url(&format!(
            "{}/{}",
            documents_path(database_id, collection),
            document_id
        ));
        let raw = self.send_json(self.client.get(&url)).await?;
        parse_document(database_id, collection, into_object(raw)?)
    }

    async fn update_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> BackendResult<Document> {
        let url = self.url(&format!(
            "{}/{}",
            documents_path(database_id, collection),
            document_id
        ));
        let raw = self
            .send_json(self.client.patch(&url).json(&json!({ "data": data })))
            .await?;
        parse_document(database_id, collection, into_object(raw)?)
    }

    async fn delete_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> BackendResult<()> {
        let url = self.url(&format!(
            "{}/{}",
            documents_path(database_id, collection),
            document_id
        ));
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection: &str,
        queries: &[Query],
    ) -> BackendResult<DocumentList> {
        let url = self.url(&documents_path(database_id, collection));
        let request = self.client.get(&url).query(&query_params(queries));
        let body: ListBody = self.send(request).await?.json().await?;

        let mut documents = Vec::with_capacity(body.documents.len());
        for raw in body.documents {
            match parse_document(database_id, collection, raw) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!(collection = %collection, error = %e, "Skipping malformed document"),
            }
        }
        Ok(DocumentList {
            total: body.total,
            documents,
        })
    }

    async fn create_collection(&self, database_id: &str, collection: &str) -> BackendResult<()> {
        if self.config.api_key.is_none() {
            return Err(BackendError::Unauthorized(
                "creating a collection needs an API key".to_string(),
            ));
        }
        let url = self.url(&format!("/databases/{}/collections", database_id));
        let body = json!({ "collectionId": collection, "name": collection });
        self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for RestBackend {
    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<FileInfo> {
        let url = self.url(&files_path(bucket));
        let form = multipart::Form::new()
            .text("fileId", file_id.to_string())
            .part("file", multipart::Part::bytes(bytes).file_name(name.to_string()));
        let body: FileBody = self
            .send(self.client.post(&url).multipart(form))
            .await?
            .json()
            .await?;
        Ok(FileInfo {
            id: body.id,
            bucket: body.bucket_id,
            name: body.name,
            size_bytes: body.size_original,
        })
    }

    async fn delete_file(&self, bucket: &str, file_id: &str) -> BackendResult<()> {
        let url = self.url(&format!("{}/{}", files_path(bucket), file_id));
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn get_file_view(&self, bucket: &str, file_id: &str) -> BackendResult<Vec<u8>> {
        let url = self.url(&format!("{}/{}/view", files_path(bucket), file_id));
        let bytes = self.send(self.client.get(&url)).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AccountService for RestBackend {
    async fn create_session(&self, email: &str, password: &str) -> BackendResult<Session> {
        let url = self.url("/account/sessions/email");
        let body = json!({ "email": email, "password": password });
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let cookie = session_cookie(response.headers());
        let session: SessionBody = response.json().await?;

        let auth = session
            .secret
            .clone()
            .filter(|s| !s.is_empty())
            .map(SessionAuth::Secret)
            .or_else(|| cookie.map(SessionAuth::Cookie));
        if auth.is_none() {
            warn!(email = %email, "Session created without a secret or session cookie");
        }
        *self.session.write().await = auth;
        Ok(Session {
            id: session.id,
            user_id: session.user_id,
            secret: session.secret,
        })
    }

    async fn delete_session(&self) -> BackendResult<()> {
        let url = self.url("/account/sessions/current");
        let result = self.send(self.client.delete(&url)).await;
        // The credential is useless either way once termination was attempted
        *self.session.write().await = None;
        result.map(|_| ())
    }

    async fn get(&self) -> BackendResult<Account> {
        let url = self.url("/account");
        let body: AccountBody = self.send(self.client.get(&url)).await?.json().await?;
        Ok(Account {
            user_id: body.id,
            email: body.email,
            name: body.name.filter(|n| !n.is_empty()),
        })
    }

    async fn get_prefs(&self) -> BackendResult<PreferenceBag> {
        let url = self.url("/account/prefs");
        let raw = self.send_json(self.client.get(&url)).await?;
        Ok(PreferenceBag::from_map(into_object(raw)?))
    }

    async fn update_prefs(&self, prefs: PreferenceBag) -> BackendResult<PreferenceBag> {
        let url = self.url("/account/prefs");
        let body = json!({ "prefs": prefs.as_map() });
        let raw = self.send_json(self.client.patch(&url).json(&body)).await?;
        // The platform answers with the whole account; prefs sit under "prefs"
        let prefs = match raw {
            Value::Object(mut account) => match account.remove("prefs") {
                Some(prefs) => into_object(prefs)?,
                None => account,
            },
            other => into_object(other)?,
        };
        Ok(PreferenceBag::from_map(prefs))
    }
}
