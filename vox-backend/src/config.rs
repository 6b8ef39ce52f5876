//! REST Backend Configuration
//!
//! Supports loading from environment variables with the VOX_ prefix.

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{BackendError, BackendResult};

fn default_timeout() -> u64 {
    30
}

/// Connection settings for the platform's REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestConfig {
    /// API endpoint, e.g. `https://cloud.appwrite.io/v1`
    pub endpoint: String,
    /// Project identifier sent with every request
    pub project_id: String,
    /// Server API key; required for collection management
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cloud.appwrite.io/v1".to_string(),
            project_id: String::new(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl RestConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - VOX_ENDPOINT: API endpoint URL
    /// - VOX_PROJECT_ID: project identifier
    /// - VOX_API_KEY: server API key (optional)
    /// - VOX_TIMEOUT_SECS: request timeout in seconds
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("VOX_ENDPOINT").unwrap_or(defaults.endpoint),
            project_id: env::var("VOX_PROJECT_ID").unwrap_or_default(),
            api_key: env::var("VOX_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: env::var("VOX_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Local self-hosted instance
    pub fn development(project_id: &str) -> Self {
        Self {
            endpoint: "http://localhost/v1".to_string(),
            project_id: project_id.to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Endpoint without trailing slash
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub fn validate(&self) -> BackendResult<()> {
        if self.project_id.is_empty() {
            return Err(BackendError::Configuration(
                "project id is not set (VOX_PROJECT_ID)".to_string(),
            ));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(BackendError::Configuration(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        Ok(())
    }
}
