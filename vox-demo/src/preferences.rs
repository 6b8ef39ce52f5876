//! Preference baselines and the preference reset executor

use serde_json::Value;
use tracing::{info, warn};
use vox_core::{pref_keys, NotificationPreferences, PreferenceBag, DEFAULT_DEMO_BIO, DEFAULT_DEMO_INTERESTS};

use crate::config::DemoConfig;
use crate::gateway::Gateway;

/// Bag written by a reset: nothing followed, default theme
pub fn reset_baseline(theme: &str) -> PreferenceBag {
    PreferenceBag::new()
        .with(pref_keys::FOLLOWED_ASSOCIATIONS, Value::Array(Vec::new()))
        .with(pref_keys::THEME, theme)
}

/// First seeding pass
pub fn essential_baseline(default_association: &str, theme: &str) -> PreferenceBag {
    PreferenceBag::new()
        .with(
            pref_keys::FOLLOWED_ASSOCIATIONS,
            Value::Array(vec![Value::String(default_association.to_string())]),
        )
        .with(pref_keys::THEME, theme)
}

/// Second seeding pass: essentials plus notifications, bio and interests
pub fn enhanced_baseline(default_association: &str, theme: &str) -> PreferenceBag {
    let notifications =
        serde_json::to_value(NotificationPreferences::default()).unwrap_or(Value::Null);
    let interests: Vec<Value> = DEFAULT_DEMO_INTERESTS
        .iter()
        .map(|i| Value::String((*i).to_string()))
        .collect();

    essential_baseline(default_association, theme)
        .with(pref_keys::NOTIFICATIONS, notifications)
        .with(pref_keys::BIO, DEFAULT_DEMO_BIO)
        .with(pref_keys::INTERESTS, Value::Array(interests))
}

/// Overwrites the demo preference bag with the reset baseline
#[derive(Clone)]
pub struct PreferenceResetExecutor {
    gateway: Gateway,
    theme: String,
}

impl PreferenceResetExecutor {
    pub fn new(gateway: Gateway, config: &DemoConfig) -> Self {
        Self {
            gateway,
            theme: config.default_theme.clone(),
        }
    }

    /// Replace the whole bag. Idempotent; reports failure as `false`.
    pub async fn reset_preferences(&self) -> bool {
        match self.gateway.update_prefs(reset_baseline(&self.theme)).await {
            Ok(_) => {
                info!("Demo preferences reset to baseline");
                true
            }
            Err(e) if e.is_rate_limited() => {
                warn!(error = %e, "Rate limited while resetting demo preferences");
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to reset demo preferences");
                false
            }
        }
    }
}
