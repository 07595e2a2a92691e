use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info};
use reclaim::configuration::{CliArgs, Config};
use reclaim::error_handling::types::ReclaimError;
use reclaim::reclamation::{Pass, Reclaimer};
use reclaim::reporting::Report;
use reclaim::runtime_client::CliRuntime;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

/// No snapshot could be taken, nothing was touched.
const EXIT_NO_SNAPSHOT: u8 = 1;
/// Invalid arguments or configuration. Matches clap's own usage exit code.
const EXIT_USAGE: u8 = 2;

#[derive(Serialize)]
struct JsonOutput<'a> {
    pass: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    dry_run: bool,
    report: &'a Report,
}

fn exit_code_for(err: &ReclaimError) -> u8 {
    match err {
        ReclaimError::SnapshotUnavailable(_) => EXIT_NO_SNAPSHOT,
        // the pass did not complete either
        ReclaimError::InvalidTransition(_) => EXIT_NO_SNAPSHOT,
    }
}

fn render(pass: &Pass, report: &Report, json: bool, dry_run: bool) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string_pretty(&JsonOutput {
            pass: pass.id,
            started_at: pass.started_at,
            finished_at: pass.finished_at,
            dry_run,
            report,
        });
    }
    let mode = if dry_run { " (dry run)" } else { "" };
    Ok(format!("Pass {}{}\n\n{}", pass.id, mode, report))
}

#[tokio::main]
async fn main() -> ExitCode {
    // clap exits on its own: 0 for --help/--version, 2 for usage errors
    let args = CliArgs::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .format_target(false)
        .init();

    let config = match Config::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("gc: invalid configuration: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    info!(
        "Configuration: runtime={} workers={} timeout={}s kinds={:?} dry_run={}",
        config.runtime, config.workers, config.timeout_secs, config.kinds, config.dry_run
    );

    let runtime = Arc::new(CliRuntime::new(config.runtime.clone()));
    let reclaimer = Reclaimer::new(runtime, config.policy(), config.options());

    let pass = match reclaimer.run_pass().await {
        Ok(pass) => pass,
        Err(e) => {
            error!("Reclamation pass failed: {}", e);
            eprintln!("gc: {}", e);
            return ExitCode::from(exit_code_for(&e));
        }
    };

    let report = Report::from_results(&pass.results);
    match render(&pass, &report, args.json, config.dry_run) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            // the pass itself completed; only the rendering failed
            error!("Unable to render report as JSON: {}", e);
            println!("{}", report);
        }
    }

    ExitCode::SUCCESS
}
