//! Backup config
//!

use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The label keys read from each container type in a service definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LabelConfig {
    /// Label that enables backups for a container type.
    pub enable: String,

    /// Label holding the comma separated pre-scripts.
    pub pre_scripts: String,

    /// Label holding the comma separated post-scripts.
    pub post_scripts: String,

    /// Label holding the comma separated data locations.
    pub data: String,

    /// The exact value of the enable label that turns backups on.
    pub enabled_value: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            enable: "io.enonic.backup.enable".into(),
            pre_scripts: "io.enonic.backup.prescripts".into(),
            post_scripts: "io.enonic.backup.postscripts".into(),
            data: "io.enonic.backup.data".into(),
            enabled_value: "yes".into(),
        }
    }
}

/// Where the admin credentials come from and how scripts refer to them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    /// The admin username.
    pub username: String,

    /// File whose first line is the admin password.
    pub password_file: PathBuf,

    /// Token replaced by the username in scripts.
    pub user_placeholder: String,

    /// Token replaced by the password in scripts.
    pub password_placeholder: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username: "su".into(),
            password_file: PathBuf::from("/services/xp_su_pwd.txt"),
            user_placeholder: "$user$".into(),
            password_placeholder: "$password$".into(),
        }
    }
}

/// Docker daemon connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DockerConfig {
    /// Path to the docker unix socket.
    pub socket: PathBuf,

    /// Request timeout for the docker client in seconds.
    pub connect_timeout_secs: u64,

    /// Upper bound for a single script execution in seconds.
    pub exec_timeout_secs: u64,

    /// Upper bound for retrieving a single data location in seconds.
    pub archive_timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: PathBuf::from("/var/run/docker.sock"),
            connect_timeout_secs: 120,
            exec_timeout_secs: 60 * 60,
            archive_timeout_secs: 60 * 60,
        }
    }
}

/// Logger settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the rolling log files.
    pub directory: PathBuf,

    /// Log at debug level.
    pub debug: bool,

    /// Use ANSI colors on stdout.
    pub use_colors: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/backup/logs"),
            debug: true,
            use_colors: true,
        }
    }
}

/// The backup config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Directory containing one sub directory per service.
    pub services_directory: PathBuf,

    /// Directory the backups are written into.
    pub backup_directory: PathBuf,

    /// Recognized service definition file names, tried in order.
    pub definition_file_names: Vec<String>,

    /// Append-only record of finished runs.
    pub history_file: PathBuf,

    /// The label keys.
    pub labels: LabelConfig,

    /// The admin credentials.
    pub credentials: CredentialsConfig,

    /// The docker connection.
    pub docker: DockerConfig,

    /// The logger.
    pub logging: LoggingConfig,
}

impl Config {
    /// Tries to load a config from a toml file.
    pub fn load_toml(file_path: PathBuf) -> Result<Self, LoadConfigError> {
        if !file_path.exists() {
            return Err(LoadConfigError::NoFile(file_path));
        }

        let contents = fs::read_to_string(file_path).map_err(LoadConfigError::Read)?;
        let config = toml::from_str(&contents)?;

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services_directory: PathBuf::from("/services"),
            backup_directory: PathBuf::from("/backup"),
            definition_file_names: vec!["docker-compose.yml".into()],
            history_file: PathBuf::from("/backup/backup-history.jsonl"),
            labels: LabelConfig::default(),
            credentials: CredentialsConfig::default(),
            docker: DockerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("The file {0:?} does not exist.")]
    NoFile(PathBuf),

    #[error("Failed to read the file:\n{0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to deserialize the file:\n{0}")]
    Deserialize(#[from] toml::de::Error),
}
