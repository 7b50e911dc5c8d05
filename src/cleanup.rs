use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::scanner::Classifier;

#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Report what would be removed without touching the filesystem.
    pub dry_run: bool,
    /// Upper bound on classify/remove passes.
    pub max_iterations: usize,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
    /// A pass found nothing left to remove.
    Converged,
    /// Every allowed pass still found candidates. Not an error: some empty
    /// directories may remain, e.g. when the tree keeps being repopulated.
    IterationLimitReached,
    /// The cancel flag was raised between passes.
    Cancelled,
}

#[derive(Debug)]
pub struct RemovalFailure {
    pub path: PathBuf,
    pub iteration: usize,
    pub error: io::Error,
}

#[derive(Debug)]
pub struct CleanReport {
    pub root: PathBuf,
    pub dry_run: bool,
    /// Removed (or, in a dry run, removable) directories in the order processed.
    pub removed: Vec<PathBuf>,
    pub failures: Vec<RemovalFailure>,
    /// Classification passes performed.
    pub iterations: usize,
    pub outcome: CleanOutcome,
}

/// Repeatedly classifies a tree and removes what the classifier reports, until a
/// pass finds nothing or the iteration budget runs out.
pub struct Cleaner {
    classifier: Classifier,
    options: CleanOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl Cleaner {
    pub fn new(classifier: Classifier, options: CleanOptions) -> Self {
        Self {
            classifier,
            options,
            cancel: None,
        }
    }

    /// Stop before the next pass once `flag` is set. The pass in progress always
    /// finishes.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn clean(&self, root: &Path, reporter: &dyn ProgressReporter) -> Result<CleanReport, Error> {
        if self.options.max_iterations == 0 {
            return Err(Error::InvalidOptions(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let dry_run = self.options.dry_run;
        reporter.on_root_start(root, dry_run);

        let mut report = CleanReport {
            root: root.to_path_buf(),
            dry_run,
            removed: Vec::new(),
            failures: Vec::new(),
            iterations: 0,
            outcome: CleanOutcome::IterationLimitReached,
        };

        while report.iterations < self.options.max_iterations {
            if self.is_cancelled() {
                info!("Cleanup of {} cancelled", root.display());
                report.outcome = CleanOutcome::Cancelled;
                break;
            }

            report.iterations += 1;
            let empty_dirs = match self.classifier.classify(root) {
                Ok(dirs) => dirs,
                // An earlier pass removed the root itself (include_root).
                Err(Error::PathNotFound(_)) if report.iterations > 1 => BTreeSet::new(),
                Err(err) => return Err(err),
            };
            reporter.on_iteration(root, report.iterations, empty_dirs.len());
            debug!(
                "Pass {} over {}: {} empty directories",
                report.iterations,
                root.display(),
                empty_dirs.len()
            );

            if empty_dirs.is_empty() {
                report.outcome = CleanOutcome::Converged;
                break;
            }

            for dir in removal_order(empty_dirs) {
                if dry_run {
                    info!("[DRY RUN] Would remove empty directory: {}", dir.display());
                    reporter.on_removed(&dir, true);
                    report.removed.push(dir);
                    continue;
                }

                match fs::remove_dir(&dir) {
                    Ok(()) => {
                        info!("Removed empty directory: {}", dir.display());
                        reporter.on_removed(&dir, false);
                        report.removed.push(dir);
                    }
                    Err(err) => {
                        warn!("Error removing {}: {}", dir.display(), err);
                        reporter.on_removal_failed(&dir, &err);
                        report.failures.push(RemovalFailure {
                            path: dir,
                            iteration: report.iterations,
                            error: err,
                        });
                    }
                }
            }

            // Nothing changed on disk, so another pass would see the same set.
            if dry_run {
                report.outcome = CleanOutcome::Converged;
                break;
            }
        }

        if report.outcome == CleanOutcome::IterationLimitReached {
            warn!(
                "Cleanup of {} stopped after {} passes without converging",
                root.display(),
                report.iterations
            );
        }

        reporter.on_root_complete(root, &report);
        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Deepest first: a path is always longer than any of its ancestors, so children are
/// removed before their parents. Ties fall back to path order.
fn removal_order(empty_dirs: BTreeSet<PathBuf>) -> Vec<PathBuf> {
    let mut ordered: Vec<PathBuf> = empty_dirs.into_iter().collect();
    ordered.sort_by_key(|path| Reverse(path.as_os_str().len()));
    ordered
}

/// Clean `root` with a default classifier.
pub fn clean(
    root: &Path,
    options: &CleanOptions,
    reporter: &dyn ProgressReporter,
) -> Result<CleanReport, Error> {
    Cleaner::new(Classifier::new(), options.clone()).clean(root, reporter)
}
