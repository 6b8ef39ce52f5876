//! CLI Commands Module
//!
//! Command definitions for the demo-account CLI.

use clap::{Parser, Subcommand};
use vox_core::DEMO_EMAIL;

/// VoxCampus demo-account maintenance
#[derive(Parser, Debug)]
#[command(name = "vox-admin")]
#[command(version)]
#[command(about = "Maintenance tool for the shared VoxCampus demo account")]
#[command(long_about = "Reset, seed and inspect the shared demo account.\n\n\
    Every command signs in as the demo identity first. Connection settings \
    are read from VOX_* environment variables (or a .env file) and can be \
    overridden with the options below.")]
pub struct Cli {
    /// API endpoint URL (env: VOX_ENDPOINT)
    #[arg(short, long, env = "VOX_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Project identifier (env: VOX_PROJECT_ID)
    #[arg(short, long, env = "VOX_PROJECT_ID")]
    pub project: Option<String>,

    /// Server API key, needed to create the tracking collection (env: VOX_API_KEY)
    #[arg(long, env = "VOX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Demo account email (env: VOX_DEMO_EMAIL)
    #[arg(long, env = "VOX_DEMO_EMAIL", default_value = DEMO_EMAIL)]
    pub demo_email: String,

    /// Demo account password (env: VOX_DEMO_PASSWORD)
    #[arg(long, env = "VOX_DEMO_PASSWORD", hide_env_values = true)]
    pub demo_password: Option<String>,

    /// Output format (json, plain)
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text
    #[default]
    Plain,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Undo every outstanding tracked change and reset preferences
    Reset,

    /// Reset only the preference bag
    ResetPrefs,

    /// Write the default demo preferences
    Seed,

    /// Show outstanding tracked changes
    Status,

    /// Check the tracking collection, creating it when missing
    EnsureStore,

    /// Delete stale tracking records of any owner
    Sweep {
        /// Override the retention window (env: VOX_RETENTION_DAYS)
        #[arg(long)]
        retention_days: Option<u32>,
    },

    /// Run a full demo login and logout, as a visitor would
    Cycle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_help() {
        let result = Cli::try_parse_from(["vox-admin", "--help"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_sweep_with_window() {
        let cli = Cli::try_parse_from([
            "vox-admin",
            "--project",
            "voxcampus",
            "--format",
            "json",
            "sweep",
            "--retention-days",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Sweep {
                retention_days: Some(3)
            }
        ));
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }
}
