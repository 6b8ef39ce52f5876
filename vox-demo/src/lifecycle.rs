//! Session Lifecycle Orchestrator
//!
//! Login-time setup and logout-time teardown for the demo identity. Any other
//! identity only gets the plain session create/delete.
//!
//! Only authentication itself can fail a login. Every later step is
//! best-effort and at worst turns the ephemeral-session notice into a
//! degraded one. Logout never fails.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use vox_backend::{BackendError, Session};
use vox_core::{AccessAction, DemoIdentity, DemoState};

use crate::access_log::AccessLog;
use crate::config::PacingConfig;
use crate::error::{DemoError, DemoResult, LogAndDrop};
use crate::gateway::Gateway;
use crate::seeder::{DefaultPreferenceSeeder, SeedReport};
use crate::throttle::pause;
use crate::tracking::{StoreStatus, TrackingStore};
use crate::undo::{UndoEngine, UndoReport};

/// Informational notice shown after a demo login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum DemoNotice {
    /// Changes made in this session are discarded on logout
    Ephemeral,
    /// Same, but some setup steps did not complete
    Degraded { reasons: Vec<String> },
}

impl DemoNotice {
    pub fn is_degraded(&self) -> bool {
        matches!(self, DemoNotice::Degraded { .. })
    }
}

impl fmt::Display for DemoNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoNotice::Ephemeral => f.write_str(
                "You are using the demo account. Changes are discarded when you log out.",
            ),
            DemoNotice::Degraded { .. } => f.write_str(
                "You are using the demo account. Changes are discarded when you log out. \
                 Some demo setup steps did not complete; the previous visitor's data may still be visible.",
            ),
        }
    }
}

/// Result of a login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub session: Session,
    pub is_demo: bool,
    pub notice: Option<DemoNotice>,
    pub store_status: Option<StoreStatus>,
    pub undo: Option<UndoReport>,
    pub seed: Option<SeedReport>,
}

/// Result of a logout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutOutcome {
    pub is_demo: bool,
    pub access_logged: bool,
    pub undo: Option<UndoReport>,
    pub session_terminated: bool,
    pub termination_error: Option<String>,
}

#[derive(Clone)]
pub struct SessionLifecycle {
    gateway: Gateway,
    identity: DemoIdentity,
    store: TrackingStore,
    access_log: AccessLog,
    undo: UndoEngine,
    seeder: DefaultPreferenceSeeder,
    pacing: PacingConfig,
}

impl SessionLifecycle {
    pub fn new(
        gateway: Gateway,
        identity: DemoIdentity,
        store: TrackingStore,
        access_log: AccessLog,
        undo: UndoEngine,
        seeder: DefaultPreferenceSeeder,
        pacing: PacingConfig,
    ) -> Self {
        Self {
            gateway,
            identity,
            store,
            access_log,
            undo,
            seeder,
            pacing,
        }
    }

    /// Authenticate, and for the demo identity prepare a pristine session
    pub async fn login(&self, email: &str, password: &str) -> DemoResult<LoginOutcome> {
        let session = self
            .gateway
            .create_session(email, password)
            .await
            .map_err(|e| match e {
                BackendError::Unauthorized(message) => DemoError::AuthenticationFailed(message),
                other => DemoError::Backend(other),
            })?;

        if !self.identity.matches(email) {
            return Ok(LoginOutcome {
                session,
                is_demo: false,
                notice: None,
                store_status: None,
                undo: None,
                seed: None,
            });
        }

        info!(email = %self.identity, "Demo login, preparing session");
        let mut degraded = Vec::new();

        pause(self.pacing.after_session()).await;
        let store_status = self.store.ensure_exists().await;
        if let StoreStatus::Unavailable { reason } = &store_status {
            degraded.push(format!("tracking store: {}", reason));
        }

        pause(self.pacing.after_store_check()).await;
        if self
            .access_log
            .record(self.identity.email(), AccessAction::Login)
            .await
            .log_and_drop("access log login")
            .is_none()
        {
            degraded.push("access log".to_string());
        }

        pause(self.pacing.before_undo()).await;
        let undo = self.undo.reset_demo_user_session().await;
        if !undo.is_complete() {
            degraded.push(format!("reset: {} error(s)", undo.errors.len()));
        }

        pause(self.pacing.before_seed()).await;
        let seed = self.seeder.setup_demo_default_preferences().await;
        if !seed.is_usable() {
            degraded.push("default preferences".to_string());
        }

        let notice = if degraded.is_empty() {
            DemoNotice::Ephemeral
        } else {
            warn!(reasons = ?degraded, "Demo login completed in degraded state");
            DemoNotice::Degraded { reasons: degraded }
        };

        Ok(LoginOutcome {
            session,
            is_demo: true,
            notice: Some(notice),
            store_status: Some(store_status),
            undo: Some(undo),
            seed: Some(seed),
        })
    }

    /// End the session of `email`. For the demo identity, the reset finishes
    /// before the session is terminated.
    pub async fn logout(&self, email: &str) -> LogoutOutcome {
        let mut outcome = LogoutOutcome {
            is_demo: self.identity.matches(email),
            ..Default::default()
        };

        if outcome.is_demo {
            info!(email = %self.identity, "Demo logout, resetting session");
            outcome.access_logged = self
                .access_log
                .record(self.identity.email(), AccessAction::Logout)
                .await
                .log_and_drop("access log logout")
                .is_some();
            outcome.undo = Some(self.undo.reset_demo_user_session().await);
        }

        match self.gateway.delete_session().await {
            Ok(()) => outcome.session_terminated = true,
            Err(e) => {
                warn!(error = %e, "Session termination failed");
                outcome.termination_error = Some(e.to_string());
            }
        }
        outcome
    }

    /// Reset outside a login/logout, e.g. from an operator
    pub async fn forced_reset(&self) -> UndoReport {
        self.access_log
            .record(self.identity.email(), AccessAction::Reset)
            .await
            .log_and_drop("access log reset");
        self.undo.reset_demo_user_session().await
    }

    /// Clean or dirty, from the number of outstanding records
    pub async fn state(&self) -> DemoResult<DemoState> {
        let outstanding = self.store.count_outstanding(self.identity.email()).await?;
        Ok(DemoState::from_outstanding(outstanding as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_text() {
        assert!(!DemoNotice::Ephemeral.is_degraded());
        let degraded = DemoNotice::Degraded {
            reasons: vec!["access log".into()],
        };
        assert!(degraded.is_degraded());
        assert!(degraded.to_string().contains("demo account"));
    }
}
