//! Vox Demo CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.
//!
//! Usage:
//!   vox-admin reset         - Undo every outstanding demo change
//!   vox-admin reset-prefs   - Reset the demo preference bag
//!   vox-admin seed          - Write the default demo preferences
//!   vox-admin status        - Show outstanding tracked changes
//!   vox-admin ensure-store  - Create the tracking collection if missing
//!   vox-admin sweep         - Delete stale tracking records
//!   vox-admin cycle         - Full demo login and logout

use clap::Parser;
use vox_cli::{handler, Cli};
use vox_demo::{init_logging, LogConfig, LogLevel};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.verbose || std::env::var_os("RUST_LOG").is_some() {
        let level = if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        if let Err(e) = init_logging(&LogConfig::default().with_level(level)) {
            eprintln!("Warning: could not initialize logging: {}", e);
        }
    }

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
