//! Tracked change records
//!
//! One record per mutation made by the demo identity. In Rust the target of a
//! change is a closed enum, so the fields a kind requires are fixed at compile
//! time. On the wire (a backend document) the record is flat, with optional
//! target columns; `to_fields`/`from_fields` convert between the two.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Wire field names of a tracked change document
pub mod fields {
    pub const CHANGE_KIND: &str = "changeKind";
    pub const TARGET_DATABASE_ID: &str = "targetDatabaseId";
    pub const TARGET_COLLECTION_NAME: &str = "targetCollectionName";
    pub const TARGET_DOCUMENT_ID: &str = "targetDocumentId";
    pub const TARGET_BUCKET_NAME: &str = "targetBucketName";
    pub const TARGET_FILE_ID: &str = "targetFileId";
    pub const TARGET_USER_ID: &str = "targetUserId";
    pub const RELATION_KIND: &str = "relationKind";
    pub const PREF_TYPE: &str = "prefType";
    pub const DATA_TYPE: &str = "dataType";
    pub const OWNER_EMAIL: &str = "ownerEmail";
    pub const CREATED_AT: &str = "createdAt";
}

/// Format a timestamp the way tracked changes store it.
///
/// Fixed millisecond precision with a `Z` suffix, so stored values sort
/// lexicographically in time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored ISO-8601 timestamp
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Tracked change identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(pub String);

impl ChangeId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChangeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChangeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Change kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Plain document write
    Document,
    /// Blob upload
    File,
    /// Profile edit
    Profile,
    /// Association relation document
    Association,
    /// Connection relation document
    Connection,
    /// Follow relation document
    Follow,
    /// Membership relation document
    Membership,
    /// Account preference change
    Preference,
}

/// What undoing a change of a given kind requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoAction {
    /// Delete the referenced document
    DeleteDocument,
    /// Delete the referenced blob
    DeleteFile,
    /// Nothing per record; the bulk preference reset covers it
    CoveredByPreferenceReset,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 8] = [
        ChangeKind::Document,
        ChangeKind::File,
        ChangeKind::Profile,
        ChangeKind::Association,
        ChangeKind::Connection,
        ChangeKind::Follow,
        ChangeKind::Membership,
        ChangeKind::Preference,
    ];

    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Document => "document",
            ChangeKind::File => "file",
            ChangeKind::Profile => "profile",
            ChangeKind::Association => "association",
            ChangeKind::Connection => "connection",
            ChangeKind::Follow => "follow",
            ChangeKind::Membership => "membership",
            ChangeKind::Preference => "preference",
        }
    }

    /// Parse a wire tag
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == tag)
    }

    pub fn undo_action(&self) -> UndoAction {
        match self {
            ChangeKind::Document
            | ChangeKind::Association
            | ChangeKind::Connection
            | ChangeKind::Follow
            | ChangeKind::Membership => UndoAction::DeleteDocument,
            ChangeKind::File => UndoAction::DeleteFile,
            ChangeKind::Profile | ChangeKind::Preference => UndoAction::CoveredByPreferenceReset,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation flavours that are undone as document deletes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Association,
    Connection,
    Follow,
    Membership,
}

impl RelationKind {
    /// Map a free-text relation tag from a collaborator
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "association" | "associations" => Some(Self::Association),
            "connection" | "connections" => Some(Self::Connection),
            "follow" | "follows" | "following" => Some(Self::Follow),
            "membership" | "memberships" | "member" => Some(Self::Membership),
            _ => None,
        }
    }

    pub fn change_kind(&self) -> ChangeKind {
        match self {
            RelationKind::Association => ChangeKind::Association,
            RelationKind::Connection => ChangeKind::Connection,
            RelationKind::Follow => ChangeKind::Follow,
            RelationKind::Membership => ChangeKind::Membership,
        }
    }

    fn from_change_kind(kind: ChangeKind) -> Option<Self> {
        match kind {
            ChangeKind::Association => Some(Self::Association),
            ChangeKind::Connection => Some(Self::Connection),
            ChangeKind::Follow => Some(Self::Follow),
            ChangeKind::Membership => Some(Self::Membership),
            _ => None,
        }
    }
}

/// Location of a document-store record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub database_id: String,
    pub collection_name: String,
    pub document_id: String,
}

impl DocumentRef {
    pub fn new(
        database_id: impl Into<String>,
        collection_name: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            collection_name: collection_name.into(),
            document_id: document_id.into(),
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.database_id, self.collection_name, self.document_id
        )
    }
}

/// Location of a blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    pub bucket_name: String,
    pub file_id: String,
}

impl FileRef {
    pub fn new(bucket_name: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            file_id: file_id.into(),
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket_name, self.file_id)
    }
}

/// What a tracked change points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeTarget {
    /// A document write
    Document(DocumentRef),
    /// A blob upload
    File(FileRef),
    /// A relation document (follow, membership, ...)
    Relation {
        kind: RelationKind,
        document: DocumentRef,
    },
    /// A profile edit on the given account
    Profile { user_id: String },
    /// A preference change
    Preference { pref_type: String, data_type: String },
}

impl ChangeTarget {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeTarget::Document(_) => ChangeKind::Document,
            ChangeTarget::File(_) => ChangeKind::File,
            ChangeTarget::Relation { kind, .. } => kind.change_kind(),
            ChangeTarget::Profile { .. } => ChangeKind::Profile,
            ChangeTarget::Preference { .. } => ChangeKind::Preference,
        }
    }

    /// Document to delete on undo, if any
    pub fn document(&self) -> Option<&DocumentRef> {
        match self {
            ChangeTarget::Document(doc) => Some(doc),
            ChangeTarget::Relation { document, .. } => Some(document),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeTarget::Document(doc) => write!(f, "document {}", doc),
            ChangeTarget::File(file) => write!(f, "file {}", file),
            ChangeTarget::Relation { kind, document } => {
                write!(f, "{} {}", kind.change_kind(), document)
            }
            ChangeTarget::Profile { user_id } => write!(f, "profile {}", user_id),
            ChangeTarget::Preference {
                pref_type,
                data_type,
            } => write!(f, "preference {}:{}", pref_type, data_type),
        }
    }
}

/// One mutation made by the demo identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedChange {
    pub id: ChangeId,
    pub target: ChangeTarget,
    /// Free-text sub-tag, kept for diagnostics only
    pub relation_kind: Option<String>,
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
}

impl TrackedChange {
    /// Create a record stamped with a fresh id and the current time
    pub fn new(target: ChangeTarget, owner_email: impl Into<String>) -> Self {
        Self {
            id: ChangeId::generate(),
            target,
            relation_kind: None,
            owner_email: owner_email.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_relation_kind(mut self, relation_kind: impl Into<String>) -> Self {
        self.relation_kind = Some(relation_kind.into());
        self
    }

    pub fn kind(&self) -> ChangeKind {
        self.target.kind()
    }

    /// Flat document body. The id is carried as the document id, not a field.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(fields::CHANGE_KIND.into(), self.kind().as_str().into());

        match &self.target {
            ChangeTarget::Document(doc) | ChangeTarget::Relation { document: doc, .. } => {
                map.insert(fields::TARGET_DATABASE_ID.into(), doc.database_id.clone().into());
                map.insert(
                    fields::TARGET_COLLECTION_NAME.into(),
                    doc.collection_name.clone().into(),
                );
                map.insert(fields::TARGET_DOCUMENT_ID.into(), doc.document_id.clone().into());
            }
            ChangeTarget::File(file) => {
                map.insert(fields::TARGET_BUCKET_NAME.into(), file.bucket_name.clone().into());
                map.insert(fields::TARGET_FILE_ID.into(), file.file_id.clone().into());
            }
            ChangeTarget::Profile { user_id } => {
                map.insert(fields::TARGET_USER_ID.into(), user_id.clone().into());
            }
            ChangeTarget::Preference {
                pref_type,
                data_type,
            } => {
                map.insert(fields::PREF_TYPE.into(), pref_type.clone().into());
                map.insert(fields::DATA_TYPE.into(), data_type.clone().into());
            }
        }

        if let Some(relation_kind) = &self.relation_kind {
            map.insert(fields::RELATION_KIND.into(), relation_kind.clone().into());
        }
        map.insert(fields::OWNER_EMAIL.into(), self.owner_email.clone().into());
        map.insert(
            fields::CREATED_AT.into(),
            format_timestamp(&self.created_at).into(),
        );
        map
    }

    /// Parse a stored document body.
    ///
    /// Fails on an unknown kind or when a field the kind requires is missing.
    pub fn try_from_fields(id: &str, map: &Map<String, Value>) -> CoreResult<Self> {
        let kind_tag = str_field(map, fields::CHANGE_KIND).unwrap_or_default();
        let kind = ChangeKind::parse(kind_tag).ok_or_else(|| CoreError::InvalidField {
            field: fields::CHANGE_KIND,
            message: format!("unknown change kind '{}'", kind_tag),
        })?;

        let require = |field: &'static str| -> CoreResult<String> {
            str_field(map, field)
                .map(str::to_string)
                .ok_or_else(|| CoreError::MissingField {
                    id: id.to_string(),
                    kind: kind.as_str().to_string(),
                    field,
                })
        };

        let target = match kind {
            ChangeKind::File => ChangeTarget::File(FileRef::new(
                require(fields::TARGET_BUCKET_NAME)?,
                require(fields::TARGET_FILE_ID)?,
            )),
            ChangeKind::Profile => ChangeTarget::Profile {
                user_id: str_field(map, fields::TARGET_USER_ID)
                    .or_else(|| str_field(map, fields::TARGET_DOCUMENT_ID))
                    .unwrap_or_default()
                    .to_string(),
            },
            ChangeKind::Preference => ChangeTarget::Preference {
                pref_type: str_field(map, fields::PREF_TYPE).unwrap_or_default().to_string(),
                data_type: str_field(map, fields::DATA_TYPE).unwrap_or_default().to_string(),
            },
            ChangeKind::Document => ChangeTarget::Document(DocumentRef::new(
                require(fields::TARGET_DATABASE_ID)?,
                require(fields::TARGET_COLLECTION_NAME)?,
                require(fields::TARGET_DOCUMENT_ID)?,
            )),
            relation => {
                let document = DocumentRef::new(
                    require(fields::TARGET_DATABASE_ID)?,
                    require(fields::TARGET_COLLECTION_NAME)?,
                    require(fields::TARGET_DOCUMENT_ID)?,
                );
                match RelationKind::from_change_kind(relation) {
                    Some(kind) => ChangeTarget::Relation { kind, document },
                    None => ChangeTarget::Document(document),
                }
            }
        };

        let created_at = str_field(map, fields::CREATED_AT)
            .and_then(parse_timestamp)
            .unwrap_or_default();

        Ok(Self {
            id: ChangeId::from(id),
            target,
            relation_kind: str_field(map, fields::RELATION_KIND).map(str::to_string),
            owner_email: str_field(map, fields::OWNER_EMAIL)
                .unwrap_or_default()
                .to_string(),
            created_at,
        })
    }
}

/// A tracking record as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoredChange {
    /// Well-formed record
    Tracked(TrackedChange),
    /// Unknown kind or missing target fields; skipped on undo but still consumed
    Unrecognized {
        id: ChangeId,
        kind: String,
        reason: String,
    },
}

impl StoredChange {
    pub fn from_fields(id: &str, map: &Map<String, Value>) -> Self {
        match TrackedChange::try_from_fields(id, map) {
            Ok(change) => StoredChange::Tracked(change),
            Err(e) => StoredChange::Unrecognized {
                id: ChangeId::from(id),
                kind: str_field(map, fields::CHANGE_KIND)
                    .unwrap_or("<missing>")
                    .to_string(),
                reason: e.to_string(),
            },
        }
    }

    pub fn id(&self) -> &ChangeId {
        match self {
            StoredChange::Tracked(change) => &change.id,
            StoredChange::Unrecognized { id, .. } => id,
        }
    }

    /// Kind tag used for grouping and logs
    pub fn kind_label(&self) -> &str {
        match self {
            StoredChange::Tracked(change) => change.kind().as_str(),
            StoredChange::Unrecognized { kind, .. } => kind,
        }
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
