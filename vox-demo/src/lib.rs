//! Vox Demo - demo-session change tracking and reset
//!
//! One shared demo account is used by anonymous visitors. Every mutation it
//! makes is recorded, and the whole set is undone at the session boundary so
//! the next visitor starts from a pristine account.
//!
//! # Components
//!
//! - **ChangeRecorder**: appends one tracked change per demo mutation
//! - **PreferenceResetExecutor**: replaces the preference bag with a baseline
//! - **UndoEngine**: replays outstanding tracked changes in reverse
//! - **SessionLifecycle**: login setup and logout teardown with pacing
//! - **DefaultPreferenceSeeder**: two-pass baseline seeding on login
//! - **TrackedMutations**: mutate-then-record helpers for collaborators
//! - **RetentionSweeper**: removes stale tracking records in the background
//! - **Throttle**: token bucket shared by every backend call
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vox_backend::MemoryBackend;
//! use vox_demo::{DemoConfig, DemoSession, Platform};
//!
//! async fn example() -> vox_demo::DemoResult<()> {
//!     let backend = Arc::new(MemoryBackend::new());
//!     let demo = DemoSession::new(Platform::from_backend(backend), DemoConfig::default());
//!
//!     let login = demo.login("demo@voxcampus.app", "demo").await?;
//!     if let Some(notice) = login.notice {
//!         println!("{}", notice);
//!     }
//!
//!     let mutations = demo.mutations("demo@voxcampus.app");
//!     mutations.follow_association("chess_club").await?;
//!
//!     demo.logout("demo@voxcampus.app").await;
//!     Ok(())
//! }
//! ```

pub mod access_log;
pub mod config;
pub mod error;
pub mod gateway;
pub mod housekeeping;
pub mod lifecycle;
pub mod mutations;
pub mod preferences;
pub mod recorder;
pub mod seeder;
pub mod telemetry;
pub mod throttle;
pub mod tracking;
pub mod undo;

pub use access_log::AccessLog;
pub use config::{DemoConfig, PacingConfig, RetentionConfig, RetryConfig, ThrottleConfig};
pub use error::{DemoError, DemoResult, LogAndDrop};
pub use gateway::{Gateway, Platform};
pub use housekeeping::{RetentionSweeper, SweepCommand, SweepReport, SweeperHandle};
pub use lifecycle::{DemoNotice, LoginOutcome, LogoutOutcome, SessionLifecycle};
pub use mutations::TrackedMutations;
pub use preferences::PreferenceResetExecutor;
pub use recorder::ChangeRecorder;
pub use seeder::{DefaultPreferenceSeeder, SeedReport};
pub use telemetry::{init_logging, LogConfig, LogFormat, LogLevel};
pub use throttle::Throttle;
pub use tracking::{StoreStatus, TrackingStore};
pub use undo::{ChangeGroup, UndoEngine, UndoReport};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use vox_core::{ChangeId, DemoIdentity, DemoState};

/// Demo Session Client
///
/// Main interface to the subsystem. Cheap to clone; all parts share one
/// throttle.
#[derive(Clone)]
pub struct DemoSession {
    config: DemoConfig,
    identity: DemoIdentity,
    gateway: Gateway,
    store: TrackingStore,
    recorder: ChangeRecorder,
    preferences: PreferenceResetExecutor,
    undo: UndoEngine,
    seeder: DefaultPreferenceSeeder,
    lifecycle: SessionLifecycle,
}

impl DemoSession {
    /// Wire every component over `platform`
    pub fn new(platform: Platform, config: DemoConfig) -> Self {
        let identity = DemoIdentity::new(config.demo_email.clone());
        let throttle = Arc::new(Throttle::new(&config.throttle));
        let gateway = Gateway::new(platform, throttle);

        let store = TrackingStore::new(gateway.clone(), &config);
        let access_log = AccessLog::new(gateway.clone(), &config);
        let recorder = ChangeRecorder::new(store.clone(), identity.clone());
        let preferences = PreferenceResetExecutor::new(gateway.clone(), &config);
        let undo = UndoEngine::new(
            gateway.clone(),
            store.clone(),
            preferences.clone(),
            identity.clone(),
            config.pacing.clone(),
        );
        let seeder = DefaultPreferenceSeeder::new(gateway.clone(), &config);
        let lifecycle = SessionLifecycle::new(
            gateway.clone(),
            identity.clone(),
            store.clone(),
            access_log,
            undo.clone(),
            seeder.clone(),
            config.pacing.clone(),
        );

        info!(demo_email = %identity, throttled = gateway.throttle().is_enabled(), "Demo session subsystem ready");

        Self {
            config,
            identity,
            gateway,
            store,
            recorder,
            preferences,
            undo,
            seeder,
            lifecycle,
        }
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    pub fn identity(&self) -> &DemoIdentity {
        &self.identity
    }

    pub fn throttle(&self) -> &Arc<Throttle> {
        self.gateway.throttle()
    }

    pub fn tracking_store(&self) -> &TrackingStore {
        &self.store
    }

    /// Whether `email` is the configured demo account
    pub fn is_demo_user(&self, email: &str) -> bool {
        self.identity.matches(email)
    }

    // ========================================================================
    // Recording
    // ========================================================================

    pub async fn track_document_change(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
    ) -> Option<ChangeId> {
        self.recorder
            .track_document_change(database_id, collection, document_id)
            .await
    }

    pub async fn track_file_upload(&self, bucket: &str, file_id: &str) -> Option<ChangeId> {
        self.recorder.track_file_upload(bucket, file_id).await
    }

    pub async fn track_profile_update(&self, user_id: &str) -> Option<ChangeId> {
        self.recorder.track_profile_update(user_id).await
    }

    pub async fn track_preference_change(&self, pref_type: &str, data_type: &str) -> Option<ChangeId> {
        self.recorder
            .track_preference_change(pref_type, data_type)
            .await
    }

    pub async fn track_relation(
        &self,
        database_id: &str,
        collection: &str,
        document_id: &str,
        relation_kind: &str,
    ) -> Option<ChangeId> {
        self.recorder
            .track_relation(database_id, collection, document_id, relation_kind)
            .await
    }

    /// Mutation helpers acting as `actor_email`
    pub fn mutations(&self, actor_email: &str) -> TrackedMutations {
        TrackedMutations::new(self.gateway.clone(), self.recorder.clone(), actor_email)
    }

    // ========================================================================
    // Reset and seeding
    // ========================================================================

    pub async fn reset_demo_user_session(&self) -> UndoReport {
        self.undo.reset_demo_user_session().await
    }

    pub async fn reset_preferences(&self) -> bool {
        self.preferences.reset_preferences().await
    }

    pub async fn setup_demo_default_preferences(&self) -> SeedReport {
        self.seeder.setup_demo_default_preferences().await
    }

    pub async fn init_demo_session_tracking(&self) -> StoreStatus {
        self.store.ensure_exists().await
    }

    /// Reset with an access-log entry, for operators
    pub async fn forced_reset(&self) -> UndoReport {
        self.lifecycle.forced_reset().await
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    pub async fn login(&self, email: &str, password: &str) -> DemoResult<LoginOutcome> {
        self.lifecycle.login(email, password).await
    }

    pub async fn logout(&self, email: &str) -> LogoutOutcome {
        self.lifecycle.logout(email).await
    }

    pub async fn state(&self) -> DemoResult<DemoState> {
        self.lifecycle.state().await
    }

    /// Outstanding record counts keyed by change kind
    pub async fn outstanding_by_kind(&self) -> DemoResult<BTreeMap<String, usize>> {
        self.store.outstanding_by_kind(self.identity.email()).await
    }

    /// Housekeeping over this session's tracking store
    pub fn retention_sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.store.clone(), self.config.retention.clone())
    }
}
