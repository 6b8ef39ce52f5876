//! Output Formatting
//!
//! Plain-text and JSON rendering of command results.

use crate::commands::OutputFormat;
use serde::Serialize;
use std::collections::BTreeMap;
use vox_core::DemoState;
use vox_demo::{LoginOutcome, LogoutOutcome, SeedReport, StoreStatus, SweepReport, UndoReport};

/// Demo account status, as printed by `status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub email: String,
    pub state: DemoState,
    pub outstanding_by_kind: BTreeMap<String, usize>,
}

/// Login and logout of one `cycle` run
#[derive(Debug, Clone, Serialize)]
pub struct CycleView {
    pub login: LoginOutcome,
    pub logout: LogoutOutcome,
}

/// Format and print data as JSON
pub fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!();
    println!("Errors:");
    for error in errors {
        println!("  - {}", error);
    }
}

pub fn print_undo_report(report: &UndoReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Plain => render_undo(report),
    }
}

fn render_undo(report: &UndoReport) {
    println!("Demo Reset");
    println!("==========");
    println!("Preferences reset: {}", yes_no(report.preferences_reset));
    println!("Records fetched:   {}", report.fetched);
    println!("Groups:            {}", report.groups);
    println!("Targets deleted:   {}", report.targets_deleted);
    println!("Already absent:    {}", report.already_absent);
    println!("Target failures:   {}", report.target_failures);
    println!("No action needed:  {}", report.no_action);
    println!("Skipped:           {}", report.skipped);
    println!("Records deleted:   {}", report.records_deleted);
    if report.rate_limited > 0 {
        println!("Rate limited:      {}", report.rate_limited);
    }
    println!("Duration:          {}ms", report.duration_ms);
    print_errors(&report.errors);
}

pub fn print_preference_reset(applied: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "preferences_reset": applied })),
        OutputFormat::Plain => println!("Preferences reset: {}", yes_no(applied)),
    }
}

pub fn print_seed_report(report: &SeedReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Plain => {
            println!("Default Preferences");
            println!("===================");
            println!("Essential: {}", yes_no(report.essential_applied));
            println!("Enhanced:  {}", yes_no(report.enhanced_applied));
            print_errors(&report.errors);
        }
    }
}

pub fn print_status(status: &StatusView, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(status),
        OutputFormat::Plain => {
            println!("Demo Account");
            println!("============");
            println!("Email: {}", status.email);
            println!("State: {}", status.state);
            if !status.outstanding_by_kind.is_empty() {
                println!();
                println!("Outstanding:");
                for (kind, count) in &status.outstanding_by_kind {
                    println!("  - {}: {}", kind, count);
                }
            }
        }
    }
}

pub fn print_store_status(status: &StoreStatus, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(status),
        OutputFormat::Plain => match status {
            StoreStatus::Ready => println!("Tracking store: ready"),
            StoreStatus::Created => println!("Tracking store: created"),
            StoreStatus::Unavailable { reason } => {
                println!("Tracking store: unavailable ({})", reason)
            }
        },
    }
}

pub fn print_sweep_report(report: &SweepReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Plain => {
            println!("Retention Sweep");
            println!("===============");
            println!("Cutoff:   {}", report.cutoff.to_rfc3339());
            println!("Scanned:  {}", report.scanned);
            println!("Deleted:  {}", report.deleted);
            println!("Failed:   {}", report.failed);
            println!("Retries:  {}", report.retries);
            println!("Batches:  {}", report.batches);
            println!("Duration: {}ms", report.duration_ms);
            print_errors(&report.errors);
        }
    }
}

pub fn print_cycle(cycle: &CycleView, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(cycle),
        OutputFormat::Plain => {
            if let Some(notice) = &cycle.login.notice {
                println!("{}", notice);
                println!();
            }
            if let Some(undo) = &cycle.login.undo {
                render_undo(undo);
                println!();
            }
            println!(
                "Session terminated: {}",
                yes_no(cycle.logout.session_terminated)
            );
            if let Some(error) = &cycle.logout.termination_error {
                println!("Termination error:  {}", error);
            }
        }
    }
}
