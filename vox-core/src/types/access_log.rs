//! Demo access-log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::change::format_timestamp;

/// What happened to the demo session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    Login,
    Logout,
    /// Forced reset from an administrative entry point
    Reset,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Login => "login",
            AccessAction::Logout => "logout",
            AccessAction::Reset => "reset",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One access-log document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogEntry {
    pub email: String,
    pub action: AccessAction,
    pub timestamp: DateTime<Utc>,
    pub client: String,
}

impl AccessLogEntry {
    pub fn new(email: impl Into<String>, action: AccessAction, client: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            action,
            timestamp: Utc::now(),
            client: client.into(),
        }
    }

    pub fn to_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("email".into(), self.email.clone().into());
        map.insert("action".into(), self.action.as_str().into());
        map.insert("timestamp".into(), format_timestamp(&self.timestamp).into());
        map.insert("client".into(), self.client.clone().into());
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_log_fields() {
        let entry = AccessLogEntry::new("demo@voxcampus.app", AccessAction::Logout, "web");
        let map = entry.to_fields();
        assert_eq!(map["action"], "logout");
        assert_eq!(map["client"], "web");
        assert!(map["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
