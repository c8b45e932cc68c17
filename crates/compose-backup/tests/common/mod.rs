//! # common
//!

#![allow(dead_code)]

use core::time::Duration;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use compose_backup::{
    Config,
    runtime::{CommandOutput, ContainerRuntime, RuntimeError},
};
use tempfile::TempDir;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A call the orchestrator made against the runtime.
///
/// Exec arguments are recorded joined with a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exec { container: String, command: String },
    Archive { container: String, path: String },
}

/// A scripted in-memory container runtime.
#[derive(Default)]
pub struct MockRuntime {
    containers: Vec<String>,
    exit_codes: HashMap<String, i64>,
    broken_commands: Vec<String>,
    archives: HashMap<(String, String), Vec<u8>>,
    fail_listing: bool,
    command_delays: HashMap<String, Duration>,
    archive_delays: HashMap<(String, String), Duration>,
    calls: Mutex<Vec<Call>>,
    exec_args: Mutex<Vec<Vec<String>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names as the docker API reports them, including the leading `/`.
    pub fn with_containers(mut self, names: &[&str]) -> Self {
        self.containers = names.iter().map(|name| format!("/{name}")).collect();
        self
    }

    /// Exit code for a command after credential substitution, zero otherwise.
    pub fn with_exit_code(mut self, command: &str, code: i64) -> Self {
        self.exit_codes.insert(command.to_string(), code);
        self
    }

    /// A command whose exec session cannot be created.
    pub fn with_broken_command(mut self, command: &str) -> Self {
        self.broken_commands.push(command.to_string());
        self
    }

    pub fn with_archive(mut self, container: &str, path: &str, archive: Vec<u8>) -> Self {
        self.archives
            .insert((container.to_string(), path.to_string()), archive);
        self
    }

    /// A command that takes `delay` to finish.
    pub fn with_command_delay(mut self, command: &str, delay: Duration) -> Self {
        self.command_delays.insert(command.to_string(), delay);
        self
    }

    /// An archive that takes `delay` before its first byte.
    pub fn with_archive_delay(mut self, container: &str, path: &str, delay: Duration) -> Self {
        self.archive_delays
            .insert((container.to_string(), path.to_string()), delay);
        self
    }

    pub fn with_failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// The argument vectors of every exec, as the container received them.
    pub fn exec_args(&self) -> Vec<Vec<String>> {
        self.exec_args.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Exec { command, .. } => Some(command),
                Call::Archive { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn list_containers(&self) -> Result<Vec<String>, RuntimeError> {
        if self.fail_listing {
            return Err(RuntimeError::Refused("daemon went away".into()));
        }

        Ok(self.containers.clone())
    }

    async fn run_command(
        &self,
        container: &str,
        args: &[String],
    ) -> Result<CommandOutput, RuntimeError> {
        let command = args.join(" ");
        self.exec_args.lock().unwrap().push(args.to_vec());
        self.calls.lock().unwrap().push(Call::Exec {
            container: container.to_string(),
            command: command.clone(),
        });

        if let Some(delay) = self.command_delays.get(&command) {
            tokio::time::sleep(*delay).await;
        }

        if self.broken_commands.iter().any(|broken| *broken == command) {
            return Err(RuntimeError::Refused(format!("no such container: {container}")));
        }

        Ok(CommandOutput {
            output: format!("ran {command}"),
            exit_code: self.exit_codes.get(&command).copied().unwrap_or(0),
        })
    }

    async fn get_archive(
        &self,
        container: &str,
        path: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<usize, RuntimeError> {
        self.calls.lock().unwrap().push(Call::Archive {
            container: container.to_string(),
            path: path.to_string(),
        });

        let key = (container.to_string(), path.to_string());
        if let Some(delay) = self.archive_delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        let Some(archive) = self.archives.get(&key) else {
            return Err(RuntimeError::Refused(format!("no such path: {path}")));
        };

        writer.write_all(archive).await.map_err(RuntimeError::Write)?;
        writer.flush().await.map_err(RuntimeError::Write)?;

        Ok(archive.len())
    }
}

/// A tar archive holding `files` as `(path, contents)`.
pub fn tar_with(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(u64::try_from(contents.len()).unwrap());
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap()
}

/// A scratch services directory and backup directory.
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("services")).unwrap();
        Self { root }
    }

    pub fn services(&self) -> PathBuf {
        self.root.path().join("services")
    }

    pub fn backups(&self) -> PathBuf {
        self.root.path().join("backup")
    }

    /// Create `services/<name>/docker-compose.yml` with `definition`.
    pub fn add_service(&self, name: &str, definition: &str) -> PathBuf {
        let directory = self.services().join(name);
        fs::create_dir_all(&directory).unwrap();
        fs::write(directory.join("docker-compose.yml"), definition).unwrap();
        directory
    }

    /// A config pointing into this workspace.
    pub fn config(&self) -> Config {
        let mut config = Config {
            services_directory: self.services(),
            backup_directory: self.backups(),
            history_file: self.backups().join("history.jsonl"),
            ..Default::default()
        };
        config.logging.directory = self.root.path().join("logs");
        config.credentials.password_file = self.root.path().join("pwd.txt");
        config.docker.exec_timeout_secs = 5;
        config.docker.archive_timeout_secs = 5;
        config
    }

    /// The single run directory created for `container`.
    pub fn run_directory(&self, container: &str) -> PathBuf {
        let prefix = format!("{container}_");
        let mut matches: Vec<PathBuf> = fs::read_dir(self.backups())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .unwrap()
                    .to_string_lossy()
                    .starts_with(&prefix)
            })
            .collect();

        assert_eq!(matches.len(), 1, "run directories for {container}: {matches:?}");
        matches.remove(0)
    }
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// A service definition with one container type.
pub fn definition(type_name: &str, labels: &[(&str, &str)]) -> String {
    let mut yaml = format!("{type_name}:\n  image: example\n  labels:\n");
    for (key, value) in labels {
        yaml.push_str(&format!("    {key}: \"{value}\"\n"));
    }
    yaml
}
