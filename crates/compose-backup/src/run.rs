//! State and outcome of a single backup run
//!

use core::time::Duration;
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    context::Context,
    discovery::DiscoveryError,
    executor::{ScriptError, ScriptPhase},
    policy::ResolveError,
    runtime::RuntimeError,
    transfer::TransferFailure,
};

/// Format of the per run timestamp in backup directory names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H.%M.%S";

/// A failure that was recorded and did not stop the run.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to discover services: {0}")]
    Discovery(#[source] DiscoveryError),

    #[error("[{service}] Skipped service: {source}")]
    Service {
        service: String,
        #[source]
        source: ResolveError,
    },

    #[error("[{service}] Failed to list containers: {source}")]
    ListContainers {
        service: String,
        #[source]
        source: RuntimeError,
    },

    #[error("[{container}] Command [{command}] ({phase}) could not run: {source}")]
    Script {
        container: String,
        phase: ScriptPhase,
        command: String,
        #[source]
        source: ScriptError,
    },

    #[error("[{container}] Command [{command}] ({phase}) exited with code {code}")]
    ExitCode {
        container: String,
        phase: ScriptPhase,
        command: String,
        code: i64,
    },

    #[error("[{container}] Failed to back up {location}: {source}")]
    Transfer {
        container: String,
        location: String,
        #[source]
        source: TransferFailure,
    },
}

impl TransferError {
    /// The container the failure belongs to, if it belongs to one.
    pub fn container(&self) -> Option<&str> {
        match self {
            Self::Script { container, .. }
            | Self::ExitCode { container, .. }
            | Self::Transfer { container, .. } => Some(container.as_str()),
            _ => None,
        }
    }
}

/// A backup run in progress.
#[derive(Debug)]
pub struct BackupRun {
    started_at: DateTime<Local>,
    started: Instant,
    timestamp: String,
    backup_root: PathBuf,
    services: usize,
    targets: usize,
    errors: Vec<TransferError>,
}

impl BackupRun {
    /// Start a run writing under `backup_root`.
    pub fn start(backup_root: &Path) -> Self {
        let started_at = Local::now();
        info!("[START] {}", started_at.format("%Y-%m-%d %H:%M:%S"));

        Self {
            timestamp: started_at.format(TIMESTAMP_FORMAT).to_string(),
            started_at,
            started: Instant::now(),
            backup_root: backup_root.to_path_buf(),
            services: 0,
            targets: 0,
            errors: Vec::new(),
        }
    }

    /// The timestamp shared by every directory this run creates.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Where this run writes its backups.
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Log and keep a recoverable failure.
    pub fn record(&mut self, context: &Context, error: TransferError) {
        error!("{context}{error}");
        self.errors.push(error);
    }

    /// Count a service whose containers were matched.
    pub fn service_processed(&mut self) {
        self.services += 1;
    }

    /// Count a container that entered the backup sequence.
    pub fn target_processed(&mut self) {
        self.targets += 1;
    }

    /// The failures recorded so far.
    pub fn errors(&self) -> &[TransferError] {
        &self.errors
    }

    /// Finish the run.
    pub fn finish(self) -> RunReport {
        let finished_at = Local::now();
        info!("[END] {}", finished_at.format("%Y-%m-%d %H:%M:%S"));

        RunReport {
            started_at: self.started_at,
            finished_at,
            duration: self.started.elapsed(),
            services: self.services,
            targets: self.targets,
            errors: self.errors,
        }
    }
}

/// The outcome of a finished run.
#[derive(Debug)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Local>,
    /// When the run finished.
    pub finished_at: DateTime<Local>,
    /// How long the run took.
    pub duration: Duration,
    /// Services whose containers were matched.
    pub services: usize,
    /// Containers that went through the backup sequence.
    pub targets: usize,
    /// Every recoverable failure, in the order they happened.
    pub errors: Vec<TransferError>,
}

impl RunReport {
    /// Log the error summary and the run duration.
    pub fn log_summary(&self) {
        if !self.errors.is_empty() {
            info!("There were {} errors:", self.errors.len());
            for error in &self.errors {
                info!("{error}");
            }
        }

        info!(
            "Backed up {} containers from {} services in {} seconds",
            self.targets,
            self.services,
            self.duration.as_secs()
        );
    }

    /// Append this run as one JSON line to `history_file`.
    pub fn append_history(&self, history_file: &Path) -> Result<(), HistoryError> {
        let record = HistoryRecord {
            started_at: self.started_at.to_rfc3339(),
            finished_at: self.finished_at.to_rfc3339(),
            duration_secs: self.duration.as_secs(),
            services: self.services,
            targets: self.targets,
            errors: self.errors.iter().map(ToString::to_string).collect(),
        };
        let line = serde_json::to_string(&record)?;

        if let Some(parent) = history_file.parent() {
            fs::create_dir_all(parent).map_err(HistoryError::WriteFile)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(history_file)
            .map_err(HistoryError::WriteFile)?;
        writeln!(file, "{line}").map_err(HistoryError::WriteFile)?;

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct HistoryRecord {
    started_at: String,
    finished_at: String,
    duration_secs: u64,
    services: usize,
    targets: usize,
    errors: Vec<String>,
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::error::Error),

    #[error("Failed to write history file: {0}")]
    WriteFile(#[source] io::Error),
}
