//! Vox CLI - maintenance tool for the shared demo account
//!
//! # Usage
//!
//! ```text
//! vox-admin [OPTIONS] <COMMAND>
//!
//! Commands:
//!   reset         Undo every outstanding tracked change and reset preferences
//!   reset-prefs   Reset only the preference bag
//!   seed          Write the default demo preferences
//!   status        Show outstanding tracked changes
//!   ensure-store  Check the tracking collection, creating it when missing
//!   sweep         Delete stale tracking records of any owner
//!   cycle         Run a full demo login and logout, as a visitor would
//!
//! Options:
//!   -e, --endpoint <URL>      API endpoint URL
//!   -p, --project <ID>        Project identifier
//!       --api-key <KEY>       Server API key
//!       --demo-email <EMAIL>  Demo account email
//!       --demo-password <PW>  Demo account password
//!   -f, --format <FORMAT>     Output format (json, plain) [default: plain]
//!   -v, --verbose             Enable verbose output
//! ```
//!
//! # Examples
//!
//! ## Nightly cleanup
//! ```text
//! vox-admin reset && vox-admin sweep --retention-days 7
//! ```
//!
//! ## Inspect the account
//! ```text
//! vox-admin --format json status
//! ```

pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
