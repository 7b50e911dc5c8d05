use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cleanup::{CleanOptions, CleanOutcome, CleanReport, Cleaner};
use crate::config::{self, AppConfig};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::scanner::Classifier;
use crate::transfer::{Dispatcher, TransferReport};

/// Drives cleanup (and optionally transfer) over all configured roots.
pub struct SweepEngine {
    config: AppConfig,
    cancel: Arc<AtomicBool>,
}

/// Cleanup result for one selected root.
#[derive(Debug)]
pub struct RootReport {
    pub root: PathBuf,
    pub result: Result<CleanReport, Error>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub roots_cleaned: usize,
    pub roots_failed: usize,
    pub directories_removed: usize,
    pub removal_failures: usize,
    pub roots_not_converged: usize,
}

impl SweepSummary {
    pub fn from_reports(reports: &[RootReport]) -> Self {
        let mut summary = SweepSummary::default();
        for report in reports {
            match &report.result {
                Ok(clean) => {
                    summary.roots_cleaned += 1;
                    summary.directories_removed += clean.removed.len();
                    summary.removal_failures += clean.failures.len();
                    if clean.outcome != CleanOutcome::Converged {
                        summary.roots_not_converged += 1;
                    }
                }
                Err(_) => summary.roots_failed += 1,
            }
        }
        summary
    }
}

#[derive(Debug)]
pub struct SyncResult {
    pub clean_reports: Vec<RootReport>,
    pub transfer_reports: Vec<TransferReport>,
    pub clean_duration: Duration,
    pub transfer_duration: Duration,
}

impl SweepEngine {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancel flag with the caller; raising it stops every root before its
    /// next pass.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The configured roots with nested duplicates folded into their outermost root,
    /// so that no two cleanups ever share a subtree. Overlap is judged on canonical
    /// paths; each surviving root keeps the spelling it was first given. Missing roots
    /// are compared as given.
    pub fn roots(&self) -> Result<Vec<PathBuf>, Error> {
        if self.config.root_paths.is_empty() {
            return Err(Error::NoRoots);
        }
        let given = self.config.roots();
        let canonical: Vec<PathBuf> = given
            .iter()
            .map(|root| fs::canonicalize(root).unwrap_or_else(|_| root.clone()))
            .collect();

        Ok(config::non_overlapping_directories(canonical.clone())
            .iter()
            .filter_map(|kept| {
                canonical
                    .iter()
                    .position(|candidate| candidate == kept)
                    .map(|index| given[index].clone())
            })
            .collect())
    }

    fn cleaner(&self, dry_run: bool) -> Result<Cleaner, Error> {
        let classifier = Classifier::new()
            .with_ignore_patterns(self.config.ignore_patterns.as_slice())?
            .include_root(self.config.include_root);
        let options = CleanOptions {
            dry_run,
            max_iterations: self.config.max_iterations,
        };
        if options.max_iterations == 0 {
            return Err(Error::InvalidOptions(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(Cleaner::new(classifier, options).with_cancel_flag(Arc::clone(&self.cancel)))
    }

    /// Clean every root. Distinct roots are processed in parallel; failures are
    /// reported per root and never stop the others.
    pub fn clean_roots(
        &self,
        dry_run: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<RootReport>, Error> {
        let roots = self.roots()?;
        let cleaner = self.cleaner(dry_run)?;
        info!(
            "{} {} folders: {:?}",
            if dry_run { "Previewing" } else { "Cleaning" },
            roots.len(),
            roots
        );

        let reports: Vec<RootReport> = roots
            .into_par_iter()
            .map(|root| {
                let result = if root.exists() {
                    cleaner.clean(&root, reporter)
                } else {
                    warn!("Folder not found: {}", root.display());
                    reporter.on_root_missing(&root);
                    Err(Error::PathNotFound(root.clone()))
                };
                if let Err(err) = &result {
                    warn!("Cleanup of {} failed: {}", root.display(), err);
                }
                RootReport { root, result }
            })
            .collect();

        let summary = SweepSummary::from_reports(&reports);
        info!(
            "Total empty directories {}: {}",
            if dry_run { "found" } else { "removed" },
            summary.directories_removed
        );
        Ok(reports)
    }

    /// Transfer the configured roots as they are, without cleaning first.
    pub fn transfer_roots(
        &self,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<TransferReport>, Error> {
        let dispatcher = Dispatcher::new(self.config.transfer.clone())?;
        let roots = self.roots()?;
        dispatcher.transfer_all(&roots, reporter)
    }

    /// Clean every root, then transfer the ones whose cleanup completed. The
    /// transfer configuration is validated before anything is removed.
    pub fn clean_and_transfer(&self, reporter: &dyn ProgressReporter) -> Result<SyncResult, Error> {
        let dispatcher = Dispatcher::new(self.config.transfer.clone())?;

        let clean_start = Instant::now();
        let clean_reports = self.clean_roots(false, reporter)?;
        let clean_duration = clean_start.elapsed();

        let cleaned: Vec<PathBuf> = clean_reports
            .iter()
            .filter(|report| {
                report
                    .result
                    .as_ref()
                    .is_ok_and(|clean| clean.outcome != CleanOutcome::Cancelled)
            })
            .map(|report| report.root.clone())
            .collect();

        let transfer_start = Instant::now();
        let transfer_reports = if cleaned.is_empty() {
            warn!("No valid folders to transfer");
            Vec::new()
        } else {
            dispatcher.transfer_all(&cleaned, reporter)?
        };

        Ok(SyncResult {
            clean_reports,
            transfer_reports,
            clean_duration,
            transfer_duration: transfer_start.elapsed(),
        })
    }
}
