//! # compose-backup
//! Backs up the data of labelled docker-compose services from their running containers.
//!

use thiserror::Error;
use tracing::{info, warn};

pub mod config;
pub mod context;
pub mod credentials;
pub mod discovery;
pub mod executor;
pub mod matcher;
pub mod orchestrator;
pub mod policy;
pub mod run;
pub mod runtime;
pub mod transfer;

pub use config::{Config, LoadConfigError};
pub use orchestrator::Orchestrator;
pub use run::{RunReport, TransferError};

use credentials::{Credentials, CredentialsError};
use runtime::{DockerRuntime, RuntimeError};

/// Run one backup against the local docker daemon.
///
/// Only failing to load the credentials or to reach the daemon is an error, both happen
/// before any service is looked at. Everything after that is recorded in the report.
pub async fn run_backup(config: &Config) -> Result<RunReport, FatalError> {
    let credentials =
        Credentials::load(&config.credentials.username, &config.credentials.password_file)?;

    info!("Connecting to docker daemon at {:?}", config.docker.socket);
    let runtime = DockerRuntime::connect(&config.docker)
        .await
        .map_err(FatalError::Connect)?;

    let report = Orchestrator::new(&runtime, config, credentials).run().await;

    report.log_summary();
    if let Err(error) = report.append_history(&config.history_file) {
        warn!("Could not write run history to {:?}: {error}", config.history_file);
    }

    Ok(report)
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("Could not load admin credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("Could not connect to the container runtime: {0}")]
    Connect(#[source] RuntimeError),
}
