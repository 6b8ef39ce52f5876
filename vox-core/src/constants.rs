//! Demo Constants
//!
//! Fixed identifiers and defaults for the shared demo account.

// ============================================================================
// Demo identity
// ============================================================================

/// Email of the single shared demo account
pub const DEMO_EMAIL: &str = "demo@voxcampus.app";

// ============================================================================
// Backend locations
// ============================================================================

/// Database holding application collections
pub const DEFAULT_DATABASE_ID: &str = "voxcampus";

/// Collection holding tracked change records
pub const DEFAULT_TRACKING_COLLECTION: &str = "demo_tracked_changes";

/// Collection holding demo access-log entries
pub const DEFAULT_ACCESS_LOG_COLLECTION: &str = "demo_access_logs";

// ============================================================================
// Baseline preferences
// ============================================================================

/// Association followed by every fresh demo session
pub const DEFAULT_FOLLOWED_ASSOCIATION: &str = "voxcampus_official";

/// Theme applied by reset and seeding
pub const DEFAULT_THEME: &str = "light";

/// Placeholder bio layered on by the enhanced seeding pass
pub const DEFAULT_DEMO_BIO: &str = "Exploring VoxCampus in demo mode.";

/// Placeholder interests layered on by the enhanced seeding pass
pub const DEFAULT_DEMO_INTERESTS: &[&str] = &["events", "clubs", "campus life"];

// ============================================================================
// Housekeeping
// ============================================================================

/// Tracked changes older than this are eligible for the retention sweep
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
