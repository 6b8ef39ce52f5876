//! Vox Backend - platform contracts and adapters
//!
//! The backend-as-a-service platform is treated as an opaque system exposing
//! three services. This crate defines them as async traits and ships two
//! implementations.
//!
//! # Services
//!
//! - **DocumentStore**: create/get/update/delete/list over `(database, collection)`
//! - **BlobStore**: create/delete/view files in named buckets
//! - **AccountService**: sessions, current identity, preference bag
//!
//! # Implementations
//!
//! - **MemoryBackend**: in-process store for tests and local development, with
//!   fault injection and a timed call log
//! - **RestBackend**: HTTP client for an Appwrite-style REST API
//!
//! # Usage
//!
//! ```ignore
//! use vox_backend::{DocumentStore, MemoryBackend};
//! use serde_json::json;
//!
//! async fn example() -> vox_backend::BackendResult<()> {
//!     let backend = MemoryBackend::new();
//!     let data = json!({ "body": "hello" }).as_object().cloned().unwrap();
//!     let doc = backend.create_document("voxcampus", "comments", "c1", data).await?;
//!     assert_eq!(doc.id, "c1");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod rest;
pub mod traits;

pub use config::RestConfig;
pub use error::{BackendError, BackendResult};
pub use memory::{CallRecord, Fault, FaultKind, MemoryBackend, Operation};
pub use rest::RestBackend;
pub use traits::{
    Account, AccountService, BlobStore, Document, DocumentList, DocumentStore, FileInfo, Query,
    Session,
};
