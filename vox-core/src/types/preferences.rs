//! Account preference bag
//!
//! A free-form JSON object attached to an account. Writes replace the whole
//! bag; there is no merge or versioning on the backend side.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known preference keys
pub mod pref_keys {
    pub const FOLLOWED_ASSOCIATIONS: &str = "followedAssociations";
    pub const THEME: &str = "theme";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const BIO: &str = "bio";
    pub const INTERESTS: &str = "interests";
}

/// Preference bag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceBag(Map<String, Value>);

impl PreferenceBag {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Overlay `other` on top of this bag, key by key
    pub fn overlay(mut self, other: PreferenceBag) -> Self {
        for (k, v) in other.0 {
            self.0.insert(k, v);
        }
        self
    }

    /// Followed association ids; non-string entries are ignored
    pub fn followed_associations(&self) -> Vec<String> {
        self.0
            .get(pref_keys::FOLLOWED_ASSOCIATIONS)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_followed_associations(&mut self, ids: Vec<String>) {
        self.insert(pref_keys::FOLLOWED_ASSOCIATIONS, ids);
    }

    /// Add an association to the followed list. Returns false if already followed.
    pub fn follow(&mut self, association_id: &str) -> bool {
        let mut ids = self.followed_associations();
        if ids.iter().any(|id| id == association_id) {
            return false;
        }
        ids.push(association_id.to_string());
        self.set_followed_associations(ids);
        true
    }

    /// Remove an association from the followed list. Returns false if absent.
    pub fn unfollow(&mut self, association_id: &str) -> bool {
        let mut ids = self.followed_associations();
        let before = ids.len();
        ids.retain(|id| id != association_id);
        if ids.len() == before {
            return false;
        }
        self.set_followed_associations(ids);
        true
    }

    pub fn theme(&self) -> Option<&str> {
        self.0.get(pref_keys::THEME).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for PreferenceBag {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Notification defaults applied by the enhanced seeding pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub comments: bool,
    pub likes: bool,
    pub events: bool,
    pub association_posts: bool,
    pub weekly_digest: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            comments: true,
            likes: true,
            events: true,
            association_posts: true,
            weekly_digest: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_follow_unfollow() {
        let mut bag = PreferenceBag::new();
        assert!(bag.followed_associations().is_empty());

        assert!(bag.follow("a1"));
        assert!(bag.follow("a2"));
        assert!(!bag.follow("a1"));
        assert_eq!(bag.followed_associations(), vec!["a1", "a2"]);

        assert!(bag.unfollow("a1"));
        assert!(!bag.unfollow("a1"));
        assert_eq!(bag.followed_associations(), vec!["a2"]);
    }

    #[test]
    fn test_overlay() {
        let base = PreferenceBag::new().with("theme", "light").with("bio", "x");
        let merged = base.overlay(PreferenceBag::new().with("theme", "dark"));
        assert_eq!(merged.theme(), Some("dark"));
        assert_eq!(merged.get("bio"), Some(&json!("x")));
    }

    #[test]
    fn test_notifications_wire_shape() {
        let value = serde_json::to_value(NotificationPreferences::default()).unwrap();
        assert_eq!(value["associationPosts"], json!(true));
        assert_eq!(value["weeklyDigest"], json!(false));
    }
}
