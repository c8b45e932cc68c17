//! Hook script execution inside containers
//!

use core::{fmt, time::Duration};

use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::{
    config::CredentialsConfig,
    credentials::Credentials,
    runtime::{CommandOutput, ContainerRuntime, RuntimeError},
};

/// When a hook script runs relative to the data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPhase {
    /// Before the data is copied.
    Pre,
    /// After the data is copied.
    Post,
}

impl ScriptPhase {
    /// Name used as the log context.
    pub fn context(&self) -> &'static str {
        match self {
            Self::Pre => "Pre-scripts",
            Self::Post => "Post-scripts",
        }
    }
}

impl fmt::Display for ScriptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre-script"),
            Self::Post => write!(f, "post-script"),
        }
    }
}

/// Runs hook scripts with the admin credentials substituted in.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    credentials: Credentials,
    user_placeholder: String,
    password_placeholder: String,
    timeout: Duration,
}

impl ScriptExecutor {
    /// Create an executor for the given credentials and placeholders.
    pub fn new(credentials: Credentials, config: &CredentialsConfig, timeout: Duration) -> Self {
        Self {
            credentials,
            user_placeholder: config.user_placeholder.clone(),
            password_placeholder: config.password_placeholder.clone(),
            timeout,
        }
    }

    /// Replace every placeholder in `command` with the admin username and password.
    pub fn substitute(&self, command: &str) -> String {
        let mut command = command.to_string();

        if !self.user_placeholder.is_empty() {
            command = command.replace(&self.user_placeholder, &self.credentials.username);
        }
        if !self.password_placeholder.is_empty() {
            command = command.replace(&self.password_placeholder, &self.credentials.password);
        }

        command
    }

    /// Split `command` into the arguments of the process started inside the container.
    ///
    /// Quoting follows shell rules, but no shell runs the result. Credentials are substituted
    /// into each argument after splitting, so they arrive verbatim whatever they contain.
    pub fn command_args(&self, command: &str) -> Result<Vec<String>, ScriptError> {
        let args = shlex::split(command).ok_or(ScriptError::Unparsable)?;
        if args.is_empty() {
            return Err(ScriptError::Empty);
        }

        Ok(args.iter().map(|arg| self.substitute(arg)).collect())
    }

    /// Run `command` inside `container` and return its output and exit code.
    ///
    /// A non-zero exit code is not an error here; only failing to run the command is.
    pub async fn execute<R: ContainerRuntime + ?Sized>(
        &self,
        runtime: &R,
        container: &str,
        command: &str,
    ) -> Result<CommandOutput, ScriptError> {
        debug!("Command to run: {command}");

        let args = self.command_args(command)?;

        let output = timeout(self.timeout, runtime.run_command(container, &args))
            .await
            .map_err(|_| ScriptError::Timeout(self.timeout))??;

        debug!("Command exit code: {}", output.exit_code);

        Ok(output)
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unbalanced quotes in command")]
    Unparsable,

    #[error("command is empty")]
    Empty,
}
