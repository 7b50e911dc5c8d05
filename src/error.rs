use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("No root folders supplied")]
    NoRoots,

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a single folder transfer did not succeed.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("transfer exited with {}: {stderr}", describe_status(.status))]
    Failed { status: Option<i32>, stderr: String },

    #[error("transfer timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("could not start transfer: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("lost track of transfer process: {0}")]
    Wait(#[source] std::io::Error),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}
