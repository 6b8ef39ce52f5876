//! Default-Preference Seeder
//!
//! Two passes on a fresh demo login. The essential pass makes the session
//! usable; the enhanced pass only runs after it succeeds and its failure is
//! tolerated.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{DemoConfig, PacingConfig};
use crate::gateway::Gateway;
use crate::preferences::{enhanced_baseline, essential_baseline};
use crate::throttle::pause;

/// Result of a seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub essential_applied: bool,
    pub enhanced_applied: bool,
    pub errors: Vec<String>,
}

impl SeedReport {
    /// The session has at least the essential preferences
    pub fn is_usable(&self) -> bool {
        self.essential_applied
    }
}

#[derive(Clone)]
pub struct DefaultPreferenceSeeder {
    gateway: Gateway,
    default_association: String,
    theme: String,
    pacing: PacingConfig,
}

impl DefaultPreferenceSeeder {
    pub fn new(gateway: Gateway, config: &DemoConfig) -> Self {
        Self {
            gateway,
            default_association: config.default_association.clone(),
            theme: config.default_theme.clone(),
            pacing: config.pacing.clone(),
        }
    }

    pub async fn setup_demo_default_preferences(&self) -> SeedReport {
        let mut report = SeedReport::default();

        let essential = essential_baseline(&self.default_association, &self.theme);
        if let Err(e) = self.gateway.update_prefs(essential).await {
            warn!(error = %e, rate_limited = e.is_rate_limited(), "Essential preference seeding failed");
            report.errors.push(format!("essential: {}", e));
            return report;
        }
        report.essential_applied = true;

        pause(self.pacing.between_seed_passes()).await;

        let enhanced = enhanced_baseline(&self.default_association, &self.theme);
        match self.gateway.update_prefs(enhanced).await {
            Ok(_) => report.enhanced_applied = true,
            Err(e) => {
                warn!(error = %e, rate_limited = e.is_rate_limited(), "Enhanced preference seeding failed, keeping essentials");
                report.errors.push(format!("enhanced: {}", e));
            }
        }

        info!(
            essential = report.essential_applied,
            enhanced = report.enhanced_applied,
            "Demo preferences seeded"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Platform;
    use crate::throttle::Throttle;
    use std::sync::Arc;
    use vox_backend::{AccountService, Fault, FaultKind, MemoryBackend, Operation};
    use vox_core::{pref_keys, DEFAULT_FOLLOWED_ASSOCIATION, DEMO_EMAIL};

    async fn seeder() -> (Arc<MemoryBackend>, DefaultPreferenceSeeder) {
        let backend = Arc::new(MemoryBackend::new());
        backend.register_account(DEMO_EMAIL, "demo", None).await;
        backend.create_session(DEMO_EMAIL, "demo").await.unwrap();
        let gateway = Gateway::new(
            Platform::from_backend(backend.clone()),
            Arc::new(Throttle::unlimited()),
        );
        (backend, DefaultPreferenceSeeder::new(gateway, &DemoConfig::test()))
    }

    #[tokio::test]
    async fn test_both_passes_apply() {
        let (backend, seeder) = seeder().await;
        let report = seeder.setup_demo_default_preferences().await;
        assert!(report.essential_applied && report.enhanced_applied);

        let prefs = backend.prefs_of(DEMO_EMAIL).await.unwrap();
        assert_eq!(prefs.followed_associations(), vec![DEFAULT_FOLLOWED_ASSOCIATION]);
        assert!(prefs.contains_key(pref_keys::NOTIFICATIONS));
    }

    #[tokio::test]
    async fn test_enhanced_failure_keeps_essentials() {
        let (backend, seeder) = seeder().await;
        backend
            .inject(Fault::new(Operation::UpdatePrefs, FaultKind::RateLimited).after(1))
            .await;

        let report = seeder.setup_demo_default_preferences().await;
        assert!(report.is_usable());
        assert!(!report.enhanced_applied);
        assert_eq!(report.errors.len(), 1);

        let prefs = backend.prefs_of(DEMO_EMAIL).await.unwrap();
        assert_eq!(prefs.len(), 2);
        assert!(!prefs.contains_key(pref_keys::BIO));
    }

    #[tokio::test]
    async fn test_essential_failure_skips_enhanced() {
        let (backend, seeder) = seeder().await;
        backend
            .inject(Fault::new(Operation::UpdatePrefs, FaultKind::Network).times(1))
            .await;

        let report = seeder.setup_demo_default_preferences().await;
        assert!(!report.essential_applied);
        assert!(!report.enhanced_applied);
        assert_eq!(backend.calls_for(Operation::UpdatePrefs).await.len(), 1);
    }
}
