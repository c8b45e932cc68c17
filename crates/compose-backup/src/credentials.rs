//! Admin credentials substituted into hook scripts
//!

use core::fmt;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// The admin username and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The admin username.
    pub username: String,

    /// The admin password.
    pub password: String,
}

impl Credentials {
    /// Create credentials from known values.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Load the password from the first line of `password_file`.
    pub fn load(username: &str, password_file: &Path) -> Result<Self, CredentialsError> {
        if !password_file.is_file() {
            return Err(CredentialsError::NoFile(password_file.to_path_buf()));
        }

        let contents = fs::read_to_string(password_file)
            .map_err(|e| CredentialsError::Read(e, password_file.to_path_buf()))?;

        let password = contents
            .lines()
            .next()
            .map(|line| line.trim_end_matches('\r'))
            .unwrap_or_default();

        if password.is_empty() {
            return Err(CredentialsError::Empty(password_file.to_path_buf()));
        }

        Ok(Self::new(username, password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Password file {0:?} does not exist")]
    NoFile(PathBuf),

    #[error("Failed to read password file {1:?}: {0}")]
    Read(#[source] io::Error, PathBuf),

    #[error("Password file {0:?} has an empty first line")]
    Empty(PathBuf),
}
