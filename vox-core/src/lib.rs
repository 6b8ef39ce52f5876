//! Vox Core - VoxCampus demo-session types
//!
//! Shared vocabulary for the demo-session subsystem:
//! - Tracked change records and their closed set of change kinds
//! - The demo identity and its recognition rule
//! - The account preference bag and its well-known keys
//! - Access-log entries written around demo login/logout
//!
//! Backend access lives in `vox-backend`; the recorder, undo engine and
//! session orchestration live in `vox-demo`.

pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::{CoreError, CoreResult};
pub use types::*;
pub use types::fields as change_fields;
