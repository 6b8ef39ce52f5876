//! Demo Subsystem Configuration
//!
//! Identity, collection names, pacing, throttling and retention for the demo
//! session subsystem. Supports loading from environment variables with the
//! VOX_ prefix.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use vox_core::{
    DEFAULT_ACCESS_LOG_COLLECTION, DEFAULT_DATABASE_ID, DEFAULT_FOLLOWED_ASSOCIATION,
    DEFAULT_RETENTION_DAYS, DEFAULT_THEME, DEFAULT_TRACKING_COLLECTION, DEMO_EMAIL,
};

/// Pauses inserted between backend calls on the interactive path.
///
/// All values are in milliseconds. The throttle is the primary limiter; these
/// keep the sequence spread out the way the platform's quotas expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Between two undo operations in the same group
    pub between_records_ms: u64,
    /// Between two change-kind groups
    pub between_groups_ms: u64,
    /// After session creation, before the tracking store check
    pub after_session_ms: u64,
    /// After the tracking store check, before the access log
    pub after_store_check_ms: u64,
    /// Before running the undo engine on login
    pub before_undo_ms: u64,
    /// Before seeding; the most rate-limit sensitive step
    pub before_seed_ms: u64,
    /// Between the essential and enhanced seeding passes
    pub between_seed_passes_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            between_records_ms: 100,
            between_groups_ms: 500,
            after_session_ms: 500,
            after_store_check_ms: 500,
            before_undo_ms: 1000,
            before_seed_ms: 2000,
            between_seed_passes_ms: 500,
        }
    }
}

impl PacingConfig {
    /// No pauses at all
    pub fn none() -> Self {
        Self {
            between_records_ms: 0,
            between_groups_ms: 0,
            after_session_ms: 0,
            after_store_check_ms: 0,
            before_undo_ms: 0,
            before_seed_ms: 0,
            between_seed_passes_ms: 0,
        }
    }

    pub fn between_records(&self) -> Duration {
        Duration::from_millis(self.between_records_ms)
    }

    pub fn between_groups(&self) -> Duration {
        Duration::from_millis(self.between_groups_ms)
    }

    pub fn after_session(&self) -> Duration {
        Duration::from_millis(self.after_session_ms)
    }

    pub fn after_store_check(&self) -> Duration {
        Duration::from_millis(self.after_store_check_ms)
    }

    pub fn before_undo(&self) -> Duration {
        Duration::from_millis(self.before_undo_ms)
    }

    pub fn before_seed(&self) -> Duration {
        Duration::from_millis(self.before_seed_ms)
    }

    pub fn between_seed_passes(&self) -> Duration {
        Duration::from_millis(self.between_seed_passes_ms)
    }
}

/// Token bucket parameters for the shared request throttle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Sustained requests per second
    pub requests_per_second: f64,
    /// Bucket capacity
    pub burst: u32,
    /// Disable throttling entirely
    pub enabled: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5.0,
            burst: 10,
            enabled: true,
        }
    }
}

impl ThrottleConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Exponential backoff for housekeeping deletes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per delete, first try included
    pub max_attempts: u32,
    /// Initial backoff in milliseconds
    pub initial_backoff_ms: u64,
    /// Maximum backoff in milliseconds
    pub max_backoff_ms: u64,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (0-based)
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let backoff =
            (self.initial_backoff_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        (backoff as u64).min(self.max_backoff_ms)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms(attempt))
    }
}

/// Retention housekeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Records older than this many days are swept
    pub retention_days: u32,
    /// Records deleted per batch
    pub batch_size: usize,
    /// Pause between batches in milliseconds
    pub batch_pause_ms: u64,
    /// Background sweep interval in seconds
    pub sweep_interval_secs: u64,
    /// Run sweeps on the interval, not only on command
    pub auto_sweep_enabled: bool,
    pub retry: RetryConfig,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            batch_size: 25,
            batch_pause_ms: 1000,
            sweep_interval_secs: 3600,
            auto_sweep_enabled: true,
            retry: RetryConfig::default(),
        }
    }
}

impl RetentionConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Demo subsystem configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Email of the shared demo account
    pub demo_email: String,
    /// Database holding the tracking and access-log collections
    pub database_id: String,
    pub tracking_collection: String,
    pub access_log_collection: String,
    /// Association followed after seeding
    pub default_association: String,
    pub default_theme: String,
    /// Page size when listing tracking records
    pub page_size: usize,
    /// Written to access-log entries
    pub client_label: String,
    pub pacing: PacingConfig,
    pub throttle: ThrottleConfig,
    pub retention: RetentionConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            demo_email: DEMO_EMAIL.to_string(),
            database_id: DEFAULT_DATABASE_ID.to_string(),
            tracking_collection: DEFAULT_TRACKING_COLLECTION.to_string(),
            access_log_collection: DEFAULT_ACCESS_LOG_COLLECTION.to_string(),
            default_association: DEFAULT_FOLLOWED_ASSOCIATION.to_string(),
            default_theme: DEFAULT_THEME.to_string(),
            page_size: 100,
            client_label: format!("vox-demo/{}", env!("CARGO_PKG_VERSION")),
            pacing: PacingConfig::default(),
            throttle: ThrottleConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl DemoConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - VOX_DEMO_EMAIL: demo account email
    /// - VOX_DATABASE_ID: database id
    /// - VOX_TRACKING_COLLECTION: tracking collection name
    /// - VOX_ACCESS_LOG_COLLECTION: access-log collection name
    /// - VOX_RETENTION_DAYS: housekeeping retention window
    /// - VOX_THROTTLE_RPS: sustained requests per second (0 disables)
    /// - VOX_THROTTLE_BURST: throttle bucket capacity
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let requests_per_second = env::var("VOX_THROTTLE_RPS")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(defaults.throttle.requests_per_second);
        let throttle = ThrottleConfig {
            requests_per_second,
            burst: env::var("VOX_THROTTLE_BURST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.throttle.burst),
            enabled: requests_per_second > 0.0,
        };

        let retention = RetentionConfig {
            retention_days: env::var("VOX_RETENTION_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retention.retention_days),
            ..defaults.retention
        };

        Self {
            demo_email: env::var("VOX_DEMO_EMAIL").unwrap_or(defaults.demo_email),
            database_id: env::var("VOX_DATABASE_ID").unwrap_or(defaults.database_id),
            tracking_collection: env::var("VOX_TRACKING_COLLECTION")
                .unwrap_or(defaults.tracking_collection),
            access_log_collection: env::var("VOX_ACCESS_LOG_COLLECTION")
                .unwrap_or(defaults.access_log_collection),
            throttle,
            retention,
            ..defaults
        }
    }

    /// Short pauses and a generous throttle for a local backend
    pub fn development() -> Self {
        Self {
            pacing: PacingConfig {
                between_records_ms: 10,
                between_groups_ms: 50,
                after_session_ms: 50,
                after_store_check_ms: 50,
                before_undo_ms: 100,
                before_seed_ms: 200,
                between_seed_passes_ms: 50,
            },
            throttle: ThrottleConfig {
                requests_per_second: 50.0,
                burst: 50,
                enabled: true,
            },
            ..Default::default()
        }
    }

    /// No pauses, no throttle, no backoff
    pub fn test() -> Self {
        Self {
            pacing: PacingConfig::none(),
            throttle: ThrottleConfig::disabled(),
            retention: RetentionConfig {
                batch_pause_ms: 0,
                retry: RetryConfig {
                    max_attempts: 3,
                    initial_backoff_ms: 0,
                    max_backoff_ms: 0,
                    backoff_multiplier: 2.0,
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_demo_email(mut self, email: &str) -> Self {
        self.demo_email = email.to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
