//! Tracked mutations
//!
//! Entry points for collaborators that mutate data on behalf of a signed-in
//! user. The primary mutation runs first and its error is returned as-is; when
//! the actor is the demo identity the change is then recorded, best-effort.

use serde_json::{Map, Value};
use vox_backend::{Document, FileInfo};
use vox_core::{pref_keys, ChangeId, PreferenceBag};

use crate::error::DemoResult;
use crate::gateway::Gateway;
use crate::recorder::ChangeRecorder;

/// Mutations performed by one actor
#[derive(Clone)]
pub struct TrackedMutations {
    gateway: Gateway,
    recorder: ChangeRecorder,
    actor_email: String,
    is_demo: bool,
}

impl TrackedMutations {
    pub fn new(gateway: Gateway, recorder: ChangeRecorder, actor_email: &str) -> Self {
        let is_demo = recorder.identity().matches(actor_email);
        Self {
            gateway,
            recorder,
            actor_email: actor_email.to_string(),
            is_demo,
        }
    }

    pub fn actor_email(&self) -> &str {
        &self.actor_email
    }

    /// Whether changes made through this handle are tracked
    pub fn is_tracked(&self) -> bool {
        self.is_demo
    }

    /// Create a document; a fresh id is generated when none is given
    pub async fn create_document(
        &self,
        database_id: &str,
        collection: &str,
        document_id: Option<&str>,
        data: Map<String, Value>,
    ) -> DemoResult<Document> {
        let id = document_id
            .map(str::to_string)
            .unwrap_or_else(|| ChangeId::generate().0);
        let doc = self
            .gateway
            .create_document(database_id, collection, &id, data)
            .await?;
        if self.is_demo {
            self.recorder
                .track_document_change(database_id, collection, &doc.id)
                .await;
        }
        Ok(doc)
    }

    /// Create a relation document (follow, membership, connection, ...)
    pub async fn create_relation(
        &self,
        database_id: &str,
        collection: &str,
        document_id: Option<&str>,
        data: Map<String, Value>,
        relation_tag: &str,
    ) -> DemoResult<Document> {
        let id = document_id
            .map(str::to_string)
            .unwrap_or_else(|| ChangeId::generate().0);
        let doc = self
            .gateway
            .create_document(database_id, collection, &id, data)
            .await?;
        if self.is_demo {
            self.recorder
                .track_relation(database_id, collection, &doc.id, relation_tag)
                .await;
        }
        Ok(doc)
    }

    pub async fn upload_file(
        &self,
        bucket: &str,
        file_id: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> DemoResult<FileInfo> {
        let file = self
            .gateway
            .create_file(bucket, file_id, name, bytes)
            .await?;
        if self.is_demo {
            self.recorder.track_file_upload(bucket, &file.id).await;
        }
        Ok(file)
    }

    /// Merge profile fields into the account preference bag
    pub async fn update_profile(&self, user_id: &str, fields: PreferenceBag) -> DemoResult<PreferenceBag> {
        let current = self.gateway.get_prefs().await?;
        let updated = self.gateway.update_prefs(current.overlay(fields)).await?;
        if self.is_demo {
            self.recorder.track_profile_update(user_id).await;
        }
        Ok(updated)
    }

    /// Set one preference key
    pub async fn update_preference(&self, key: &str, value: Value) -> DemoResult<PreferenceBag> {
        let data_type = json_type(&value);
        let mut prefs = self.gateway.get_prefs().await?;
        prefs.insert(key, value);
        let updated = self.gateway.update_prefs(prefs).await?;
        if self.is_demo {
            self.recorder.track_preference_change(key, data_type).await;
        }
        Ok(updated)
    }

    /// Add an association to `followedAssociations`
    pub async fn follow_association(&self, association_id: &str) -> DemoResult<PreferenceBag> {
        let mut prefs = self.gateway.get_prefs().await?;
        if !prefs.follow(association_id) {
            return Ok(prefs);
        }
        let updated = self.gateway.update_prefs(prefs).await?;
        if self.is_demo {
            self.recorder
                .track_preference_change(pref_keys::FOLLOWED_ASSOCIATIONS, "array")
                .await;
        }
        Ok(updated)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_type_names() {
        assert_eq!(json_type(&Value::from("x")), "string");
        assert_eq!(json_type(&Value::from(vec![1, 2])), "array");
        assert_eq!(json_type(&serde_json::json!({ "a": 1 })), "object");
    }
}
