mod cli;
mod logging;
mod reporter;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use colored::*;
use dirsweep::{AppConfig, RootReport, SweepEngine, SweepSummary, TransferReport};
use dotenv::dotenv;
use reporter::CliReporter;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    dotenv().ok();

    let guard = logging::init_logger();

    let code = match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    };

    // Flush the file log before the process ends.
    drop(guard);
    code
}

fn run(args: Cli) -> anyhow::Result<()> {
    let loaded = match &args.config {
        Some(path) => dirsweep::config::load_configuration_from(path),
        None => dirsweep::config::load_configuration(),
    };
    let mut config = loaded.context("Error loading configuration")?;

    match args.command {
        Some(Commands::Preview(sweep)) => {
            sweep.apply(&mut config);
            run_clean(config, cancel_flag(), true)
        }
        Some(Commands::Clean(sweep)) => {
            sweep.apply(&mut config);
            run_clean(config, cancel_flag(), false)
        }
        Some(Commands::Sync { sweep, transfer }) => {
            sweep.apply(&mut config);
            transfer.apply(&mut config);
            run_sync(config, cancel_flag(), transfer.yes)
        }
        Some(Commands::Transfer { roots, transfer }) => {
            transfer.apply_with_roots(&mut config, &roots);
            run_transfer(config, transfer.yes)
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            Cli::command().print_long_help()?;
            Ok(())
        }
    }
}

/// Raised by Ctrl-C; cleanup stops before its next pass.
fn cancel_flag() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(err) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Unable to install Ctrl-C handler: {}", err);
    }
    cancel
}

fn run_clean(config: AppConfig, cancel: Arc<AtomicBool>, dry_run: bool) -> anyhow::Result<()> {
    let engine = SweepEngine::new(config).with_cancel_flag(cancel);
    let reporter = CliReporter::new();

    if dry_run {
        info!("=== PREVIEW CLEANUP (DRY RUN) ===");
    } else {
        info!("=== STARTING FOLDER CLEANUP ===");
    }
    let reports = engine
        .clean_roots(dry_run, &reporter)
        .context("cleanup failed")?;
    reporter.finish();

    print_clean_summary(&reports, dry_run);
    Ok(())
}

fn run_sync(config: AppConfig, cancel: Arc<AtomicBool>, assume_yes: bool) -> anyhow::Result<()> {
    let engine = SweepEngine::new(config).with_cancel_flag(cancel);
    let roots = engine.roots()?;
    let destination = engine.config().transfer.destination();

    let prompt = format!(
        "This will:\n1. Clean empty directories from {} folders\n2. Transfer cleaned folders to {}\n\nProceed?",
        roots.len(),
        destination
    );
    if !assume_yes && !confirm_on_terminal(&prompt)? {
        info!("Transfer cancelled");
        return Ok(());
    }

    let reporter = CliReporter::new();
    let result = engine
        .clean_and_transfer(&reporter)
        .context("clean and transfer failed")?;
    reporter.finish();

    println!();
    info!(
        "Cleanup: {}, Transfer: {}",
        format!("{:.2}s", result.clean_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.transfer_duration.as_secs_f64()).green(),
    );
    print_clean_summary(&result.clean_reports, false);
    print_transfer_summary(&result.transfer_reports);
    Ok(())
}

fn run_transfer(config: AppConfig, assume_yes: bool) -> anyhow::Result<()> {
    let engine = SweepEngine::new(config);
    let roots = engine.roots()?;

    let prompt = format!(
        "This will transfer {} folders to {}\n\nProceed?",
        roots.len(),
        engine.config().transfer.destination()
    );
    if !assume_yes && !confirm_on_terminal(&prompt)? {
        info!("Transfer cancelled");
        return Ok(());
    }

    let reporter = CliReporter::new();
    let reports = engine
        .transfer_roots(&reporter)
        .context("transfer failed")?;
    reporter.finish();

    print_transfer_summary(&reports);
    Ok(())
}

fn print_clean_summary(reports: &[RootReport], dry_run: bool) {
    let summary = SweepSummary::from_reports(reports);
    info!(
        "{} empty directories {}, {} removal failures",
        format!("{}", summary.directories_removed).cyan(),
        if dry_run { "found" } else { "removed" },
        format!("{}", summary.removal_failures).red(),
    );
    if summary.roots_failed > 0 {
        warn!("{} folders could not be processed", summary.roots_failed);
    }
    if summary.roots_not_converged > 0 {
        warn!(
            "{} folders stopped before every empty directory was removed",
            summary.roots_not_converged
        );
    }
}

fn print_transfer_summary(reports: &[TransferReport]) {
    let succeeded = reports.iter().filter(|r| r.succeeded()).count();
    info!(
        "{} folders transferred, {} failed",
        format!("{}", succeeded).green(),
        format!("{}", reports.len() - succeeded).red(),
    );
}

fn confirm_on_terminal(prompt: &str) -> io::Result<bool> {
    confirm(prompt, &mut io::stdin().lock(), &mut io::stdout())
}

/// Ask until the answer is y or n. An empty answer or end of input means no.
fn confirm<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> io::Result<bool> {
    let mut answer = String::new();
    loop {
        answer.clear();
        write!(output, "{} (y/N): ", prompt)?;
        output.flush()?;

        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "" | "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}
