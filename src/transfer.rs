use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::TransferConfig;
use crate::error::{Error, TransferError};
use crate::progress::ProgressReporter;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a transfer that exited successfully.
#[derive(Debug, Clone, Default)]
pub struct TransferOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
pub struct TransferReport {
    pub folder: PathBuf,
    pub command_line: String,
    pub duration: Duration,
    pub result: Result<TransferOutput, TransferError>,
}

impl TransferReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Copies folders to the configured remote with one external process per folder.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: TransferConfig,
}

impl Dispatcher {
    pub fn new(config: TransferConfig) -> Result<Self, Error> {
        if config.program.trim().is_empty() {
            return Err(Error::InvalidConfig("transfer program is empty".to_string()));
        }
        if config.path.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "remote path is required for transfer".to_string(),
            ));
        }
        if config.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "transfer timeout must be at least one second".to_string(),
            ));
        }
        Ok(Self { config })
    }

    /// Arguments passed to the program: option flags, the folder, then the destination.
    pub fn command_args(&self, folder: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if self.config.verbose {
            args.push("-v".into());
        }
        if self.config.recursive {
            args.push("-r".into());
        }
        if self.config.preserve_attributes {
            args.push("-p".into());
        }
        args.push(folder.as_os_str().to_os_string());
        args.push(self.config.destination().into());
        args
    }

    fn command_line(&self, args: &[OsString]) -> String {
        let mut line = self.config.program.clone();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Transfer every folder in order. A failing folder does not stop the rest.
    pub fn transfer_all(
        &self,
        folders: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<TransferReport>, Error> {
        if folders.is_empty() {
            return Err(Error::NoRoots);
        }

        info!(
            "Transferring {} folders to {}",
            folders.len(),
            self.config.destination()
        );
        let reports: Vec<TransferReport> = folders
            .iter()
            .map(|folder| self.transfer(folder, reporter))
            .collect();

        let failed = reports.iter().filter(|r| !r.succeeded()).count();
        info!(
            "Transfer complete: {} succeeded, {} failed",
            reports.len() - failed,
            failed
        );
        Ok(reports)
    }

    pub fn transfer(&self, folder: &Path, reporter: &dyn ProgressReporter) -> TransferReport {
        let args = self.command_args(folder);
        let command_line = self.command_line(&args);
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| folder.display().to_string());

        info!("Running: {}", command_line);
        reporter.on_transfer_start(folder, &command_line);

        let start = Instant::now();
        let mut command = Command::new(&self.config.program);
        command.args(&args);
        let result = run_with_timeout(&mut command, self.config.timeout());
        let duration = start.elapsed();

        match &result {
            Ok(output) => {
                info!("Successfully transferred: {}", name);
                if !output.stdout.trim().is_empty() {
                    debug!("Output: {}", output.stdout.trim());
                }
            }
            Err(err) => warn!("Transfer failed for {}: {}", name, err),
        }

        let report = TransferReport {
            folder: folder.to_path_buf(),
            command_line,
            duration,
            result,
        };
        reporter.on_transfer_complete(&report);
        report
    }
}

fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> Result<TransferOutput, TransferError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(TransferError::Spawn)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().map_err(TransferError::Wait)? {
            break status;
        }
        if Instant::now() >= deadline {
            kill(&mut child);
            // The readers are left to finish on their own: a grandchild may still
            // hold the pipes open.
            return Err(TransferError::TimedOut(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let output = TransferOutput {
        stdout: collect(stdout),
        stderr: collect(stderr),
    };

    if status.success() {
        Ok(output)
    } else {
        Err(TransferError::Failed {
            status: status.code(),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!("Unable to kill transfer process {}: {}", child.id(), err);
    }
    let _ = child.wait();
}
