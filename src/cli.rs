use clap::{Args, Parser, Subcommand};
use dirsweep::AppConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dirsweep")]
#[command(about = "Remove empty directory trees, then copy the cleaned folders over scp", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./Config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the directories a cleanup would remove, without removing anything
    Preview(SweepArgs),
    /// Remove empty directories from each folder
    Clean(SweepArgs),
    /// Clean each folder, then transfer the cleaned folders
    Sync {
        #[command(flatten)]
        sweep: SweepArgs,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Transfer folders as they are
    Transfer {
        /// Folders to transfer; replaces root_paths from the configuration
        roots: Vec<PathBuf>,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Folders to process; replaces root_paths from the configuration
    pub roots: Vec<PathBuf>,

    /// Maximum classify/remove passes per folder
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Also remove a folder itself when it ends up empty
    #[arg(long)]
    pub include_root: bool,

    /// Glob for directories that must never be removed (repeatable)
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Args)]
pub struct TransferArgs {
    /// Remote host, e.g. user@hostname
    #[arg(long)]
    pub host: Option<String>,

    /// Remote target path
    #[arg(long)]
    pub remote_path: Option<String>,

    /// Do not copy subdirectories (omit -r)
    #[arg(long)]
    pub no_recursive: bool,

    /// Do not preserve timestamps and permissions (omit -p)
    #[arg(long)]
    pub no_preserve: bool,

    /// Seconds before a single folder transfer is abandoned
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

fn replace_roots(config: &mut AppConfig, roots: &[PathBuf]) {
    if !roots.is_empty() {
        config.root_paths = roots
            .iter()
            .map(|root| root.to_string_lossy().into_owned())
            .collect();
    }
}

impl SweepArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        replace_roots(config, &self.roots);
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if self.include_root {
            config.include_root = true;
        }
        config
            .ignore_patterns
            .extend(self.ignore_patterns.iter().cloned());
    }
}

impl TransferArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        let transfer = &mut config.transfer;
        if let Some(host) = &self.host {
            transfer.host = host.clone();
        }
        if let Some(path) = &self.remote_path {
            transfer.path = path.clone();
        }
        if self.no_recursive {
            transfer.recursive = false;
        }
        if self.no_preserve {
            transfer.preserve_attributes = false;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            transfer.timeout_secs = timeout_secs;
        }
    }

    pub fn apply_with_roots(&self, config: &mut AppConfig, roots: &[PathBuf]) {
        replace_roots(config, roots);
        self.apply(config);
    }
}
