pub mod cleanup;
pub mod config;
pub mod engine;
pub mod error;
pub mod progress;
pub mod scanner;
pub mod transfer;

pub use crate::cleanup::{clean, CleanOptions, CleanOutcome, CleanReport, Cleaner, RemovalFailure};
pub use crate::config::AppConfig;
pub use crate::engine::{RootReport, SweepEngine, SweepSummary, SyncResult};
pub use crate::error::{Error, TransferError};
pub use crate::progress::{ProgressReporter, SilentReporter};
pub use crate::scanner::{classify, Classifier};
pub use crate::transfer::{Dispatcher, TransferOutput, TransferReport};
