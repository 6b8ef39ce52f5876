//! Core type definitions
//!
//! Field names follow the backend document shape (camelCase on the wire,
//! snake_case in Rust).

mod access_log;
mod change;
mod identity;
mod preferences;

pub use access_log::*;
pub use change::*;
pub use identity::*;
pub use preferences::*;
