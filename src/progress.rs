use std::io;
use std::path::Path;

use crate::cleanup::CleanReport;
use crate::transfer::TransferReport;

/// Trait for reporting sweep progress.
///
/// The CLI implements it with tracing/indicatif; tests use it to observe or perturb a
/// run. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_root_start(&self, _root: &Path, _dry_run: bool) {}
    fn on_iteration(&self, _root: &Path, _iteration: usize, _candidates: usize) {}
    fn on_removed(&self, _path: &Path, _dry_run: bool) {}
    fn on_removal_failed(&self, _path: &Path, _error: &io::Error) {}
    fn on_root_complete(&self, _root: &Path, _report: &CleanReport) {}
    fn on_root_missing(&self, _root: &Path) {}
    fn on_transfer_start(&self, _folder: &Path, _command_line: &str) {}
    fn on_transfer_complete(&self, _report: &TransferReport) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
