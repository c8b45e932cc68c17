//! Container runtime the backups are taken from.
//!

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWrite;

mod docker;

pub use docker::DockerRuntime;

/// The combined output and exit code of a command run inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Stdout and stderr of the command.
    pub output: String,

    /// The exit code, `-1` when the runtime did not report one.
    pub exit_code: i64,
}

impl CommandOutput {
    /// If the command exited with zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The operations the backup needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Every name of every running container, as reported by the runtime.
    async fn list_containers(&self) -> Result<Vec<String>, RuntimeError>;

    /// Start `args` as a process inside `container`, without a shell, and wait for it to exit.
    async fn run_command(
        &self,
        container: &str,
        args: &[String],
    ) -> Result<CommandOutput, RuntimeError>;

    /// Stream `path` of `container` as a tar archive into `writer`.
    ///
    /// Returns the number of bytes written.
    async fn get_archive(
        &self,
        container: &str,
        path: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<usize, RuntimeError>;
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to connect to the docker daemon: {0}")]
    Connect(#[source] bollard::errors::Error),

    #[error("Docker request failed: {0}")]
    Request(#[from] bollard::errors::Error),

    #[error("Failed to write archive: {0}")]
    Write(#[source] io::Error),

    #[error("Container runtime refused the request: {0}")]
    Refused(String),
}
