//! Command Handlers

use std::sync::Arc;
use tracing::{info, warn};
use vox_backend::{AccountService, BackendError, BlobStore, DocumentStore, RestBackend, RestConfig};
use vox_demo::{DemoConfig, DemoSession, Platform};

use crate::commands::{Cli, Commands, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output::{self, CycleView, StatusView};

fn rest_config(cli: &Cli) -> RestConfig {
    let mut config = RestConfig::from_env();
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(project) = &cli.project {
        config.project_id = project.clone();
    }
    if let Some(key) = cli.api_key.as_deref().filter(|k| !k.is_empty()) {
        config.api_key = Some(key.to_string());
    }
    config
}

fn demo_password(cli: &Cli) -> CliResult<&str> {
    cli.demo_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CliError::config("demo password is not set (VOX_DEMO_PASSWORD)"))
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    let password = demo_password(&cli)?.to_string();
    let backend = Arc::new(RestBackend::new(rest_config(&cli)).map_err(|e| match e {
        BackendError::Configuration(message) => CliError::config(message),
        other => CliError::from(other),
    })?);
    run_on(cli, backend, &password).await
}

/// Run a command against `backend`. Admin commands hold a session only
/// for the duration of the command.
pub async fn run_on<B>(cli: Cli, backend: Arc<B>, password: &str) -> CliResult<()>
where
    B: DocumentStore + BlobStore + AccountService + 'static,
{
    let config = DemoConfig::from_env().with_demo_email(&cli.demo_email);
    let demo = DemoSession::new(Platform::from_backend(backend.clone()), config);

    // `cycle` goes through the visitor login path itself
    if matches!(cli.command, Commands::Cycle) {
        return handle_cycle(&demo, password, cli.format).await;
    }

    sign_in(backend.as_ref(), &demo, password).await?;
    let result = match cli.command {
        Commands::Reset => handle_reset(&demo, cli.format).await,
        Commands::ResetPrefs => handle_reset_prefs(&demo, cli.format).await,
        Commands::Seed => handle_seed(&demo, cli.format).await,
        Commands::Status => handle_status(&demo, cli.format).await,
        Commands::EnsureStore => handle_ensure_store(&demo, cli.format).await,
        Commands::Sweep { retention_days } => handle_sweep(&demo, retention_days, cli.format).await,
        Commands::Cycle => Ok(()),
    };
    sign_out(backend.as_ref()).await;
    result
}

/// Plain session as the demo identity, without the login-time reset
async fn sign_in(
    backend: &dyn AccountService,
    demo: &DemoSession,
    password: &str,
) -> CliResult<()> {
    let email = demo.identity().email();
    backend
        .create_session(email, password)
        .await
        .map_err(|e| match e {
            BackendError::Unauthorized(message) => CliError::authentication(message),
            other => CliError::from(other),
        })?;
    info!(email = %email, "Signed in as demo identity");
    Ok(())
}

async fn sign_out(backend: &dyn AccountService) {
    match backend.delete_session().await {
        Ok(()) => info!("Signed out"),
        Err(e) => warn!(error = %e, "Failed to terminate admin session"),
    }
}

async fn handle_reset(demo: &DemoSession, format: OutputFormat) -> CliResult<()> {
    let report = demo.forced_reset().await;
    output::print_undo_report(&report, format);
    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::incomplete(format!(
            "{} target(s) and {} record(s) left behind",
            report.target_failures, report.record_failures
        )))
    }
}

async fn handle_reset_prefs(demo: &DemoSession, format: OutputFormat) -> CliResult<()> {
    let applied = demo.reset_preferences().await;
    output::print_preference_reset(applied, format);
    if applied {
        Ok(())
    } else {
        Err(CliError::incomplete("preference reset failed"))
    }
}

async fn handle_seed(demo: &DemoSession, format: OutputFormat) -> CliResult<()> {
    let report = demo.setup_demo_default_preferences().await;
    output::print_seed_report(&report, format);
    if report.is_usable() {
        Ok(())
    } else {
        Err(CliError::incomplete("essential preferences were not applied"))
    }
}

async fn handle_status(demo: &DemoSession, format: OutputFormat) -> CliResult<()> {
    let status = StatusView {
        email: demo.identity().email().to_string(),
        state: demo.state().await?,
        outstanding_by_kind: demo.outstanding_by_kind().await?,
    };
    output::print_status(&status, format);
    Ok(())
}

async fn handle_ensure_store(demo: &DemoSession, format: OutputFormat) -> CliResult<()> {
    let status = demo.init_demo_session_tracking().await;
    output::print_store_status(&status, format);
    if status.is_usable() {
        Ok(())
    } else {
        Err(CliError::incomplete("tracking store is unavailable"))
    }
}

async fn handle_sweep(
    demo: &DemoSession,
    retention_days: Option<u32>,
    format: OutputFormat,
) -> CliResult<()> {
    let sweeper = demo.retention_sweeper();
    let report = match retention_days {
        Some(days) => sweeper.sweep_older_than(days).await,
        None => sweeper.sweep().await,
    };
    output::print_sweep_report(&report, format);
    if report.failed == 0 && report.errors.is_empty() {
        Ok(())
    } else {
        Err(CliError::incomplete(format!(
            "{} expired record(s) could not be deleted",
            report.failed
        )))
    }
}

async fn handle_cycle(demo: &DemoSession, password: &str, format: OutputFormat) -> CliResult<()> {
    let email = demo.identity().email().to_string();
    let login = demo.login(&email, password).await?;
    let logout = demo.logout(&email).await;

    let degraded = login.notice.as_ref().is_some_and(|n| n.is_degraded());
    let cycle = CycleView { login, logout };
    output::print_cycle(&cycle, format);

    if degraded {
        Err(CliError::incomplete("demo login completed in a degraded state"))
    } else {
        Ok(())
    }
}
