use colored::*;
use dirsweep::{CleanOutcome, CleanReport, ProgressReporter, TransferReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// CLI progress reporter: a single spinner shared by every root, with one summary
/// line printed per finished root or folder transfer.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spinner(&self, message: String) {
        let mut guard = self.bar();
        match guard.as_ref() {
            Some(pb) => pb.set_message(message),
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner())
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
                );
                pb.set_message(message);
                pb.enable_steady_tick(Duration::from_millis(80));
                *guard = Some(pb);
            }
        }
    }

    fn println(&self, line: String) {
        match self.bar().as_ref() {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = self.bar().take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_root_start(&self, root: &Path, dry_run: bool) {
        let verb = if dry_run { "Scanning" } else { "Cleaning" };
        self.spinner(format!("{} {}", verb, root.display()));
    }

    fn on_iteration(&self, root: &Path, iteration: usize, candidates: usize) {
        self.spinner(format!(
            "{} pass {}: {} empty directories",
            root.display(),
            iteration,
            candidates
        ));
    }

    fn on_removed(&self, path: &Path, dry_run: bool) {
        let verb = if dry_run { "Would remove" } else { "Removed" };
        self.spinner(format!("{} {}", verb, path.display()));
    }

    fn on_removal_failed(&self, path: &Path, error: &io::Error) {
        self.println(format!(
            "  {} Error removing {}: {}",
            "✗".red(),
            path.display(),
            error
        ));
    }

    fn on_root_complete(&self, root: &Path, report: &CleanReport) {
        let verb = if report.dry_run { "would remove" } else { "removed" };
        let outcome = match report.outcome {
            CleanOutcome::Converged => "done".green(),
            CleanOutcome::IterationLimitReached => "iteration limit reached".yellow(),
            CleanOutcome::Cancelled => "cancelled".yellow(),
        };
        self.println(format!(
            "  {} {}: {} {} directories, {} failures, {} passes ({})",
            "✓".green(),
            root.display(),
            verb,
            report.removed.len(),
            report.failures.len(),
            report.iterations,
            outcome
        ));
    }

    fn on_root_missing(&self, root: &Path) {
        self.println(format!("  {} Folder not found: {}", "✗".red(), root.display()));
    }

    fn on_transfer_start(&self, folder: &Path, _command_line: &str) {
        self.spinner(format!("Transferring {}", folder.display()));
    }

    fn on_transfer_complete(&self, report: &TransferReport) {
        match &report.result {
            Ok(_) => self.println(format!(
                "  {} Successfully transferred {} in {:.2}s",
                "✓".green(),
                report.folder.display(),
                report.duration.as_secs_f64()
            )),
            Err(err) => self.println(format!(
                "  {} Transfer failed for {}: {}",
                "✗".red(),
                report.folder.display(),
                err
            )),
        }
    }
}
