//! Docker daemon access through bollard
//!

use core::pin::pin;

use async_trait::async_trait;
use bollard::{
    API_DEFAULT_VERSION, Docker,
    container::{DownloadFromContainerOptions, ListContainersOptions},
    exec::{CreateExecOptions, StartExecResults},
};
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::DockerConfig;

use super::{CommandOutput, ContainerRuntime, RuntimeError};

/// A docker daemon reached over its unix socket.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon and verify it answers.
    pub async fn connect(config: &DockerConfig) -> Result<Self, RuntimeError> {
        let socket = config.socket.to_string_lossy();

        let docker =
            Docker::connect_with_socket(&socket, config.connect_timeout_secs, API_DEFAULT_VERSION)
                .map_err(RuntimeError::Connect)?;

        let version = docker.version().await.map_err(RuntimeError::Connect)?;
        debug!(
            "Docker version {} (API {})",
            version.version.unwrap_or_default(),
            version.api_version.unwrap_or_default()
        );

        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<String>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .flat_map(|container| container.names.unwrap_or_default())
            .collect())
    }

    async fn run_command(
        &self,
        container: &str,
        args: &[String],
    ) -> Result<CommandOutput, RuntimeError> {
        let options = CreateExecOptions {
            cmd: Some(args.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self.docker.create_exec(container, options).await?;

        let mut output = String::new();
        if let StartExecResults::Attached {
            output: mut stream, ..
        } = self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = stream.next().await {
                output.push_str(&chunk?.to_string());
            }
        }

        // The exit code is only known once the output stream has ended.
        let inspect = self.docker.inspect_exec(&exec.id).await?;

        Ok(CommandOutput {
            output: output.trim().to_string(),
            exit_code: inspect.exit_code.unwrap_or(-1),
        })
    }

    async fn get_archive(
        &self,
        container: &str,
        path: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<usize, RuntimeError> {
        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };

        let mut stream = pin!(self.docker.download_from_container(container, Some(options)));

        let mut written: usize = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await.map_err(RuntimeError::Write)?;
            written = written.saturating_add(chunk.len());
        }

        writer.flush().await.map_err(RuntimeError::Write)?;

        Ok(written)
    }
}
