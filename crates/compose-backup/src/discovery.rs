//! Service discovery
//!

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, warn};

/// A service directory holding a service definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDirectory {
    path: PathBuf,
    definition_file: PathBuf,
}

impl ServiceDirectory {
    /// Create a service directory from its path and definition file.
    pub fn new(path: PathBuf, definition_file: PathBuf) -> Self {
        Self {
            path,
            definition_file,
        }
    }

    /// The service directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The service definition file inside the directory.
    pub fn definition_file(&self) -> &Path {
        &self.definition_file
    }

    /// The leaf name of the directory.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// The prefix compose gives the container names of this service: the directory name
    /// without any `.` characters.
    pub fn container_prefix(&self) -> String {
        self.name().replace('.', "")
    }
}

/// Find every immediate sub directory of `root` that contains a service definition.
///
/// Directories without one of `file_names` are skipped. The result is sorted by path.
pub fn discover_services(
    root: &Path,
    file_names: &[String],
) -> Result<Vec<ServiceDirectory>, DiscoveryError> {
    let entries =
        fs::read_dir(root).map_err(|e| DiscoveryError::ReadRoot(e, root.to_path_buf()))?;

    let mut services: Vec<ServiceDirectory> = entries
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!("Could not read entry in {root:?}: {error}");
                    return None;
                }
            };
            let path = entry.path();

            if !path.is_dir() {
                return None;
            }

            let definition_file = file_names
                .iter()
                .map(|file_name| path.join(file_name))
                .find(|candidate| candidate.is_file());

            match definition_file {
                Some(definition_file) => Some(ServiceDirectory::new(path, definition_file)),
                None => {
                    debug!("Skipping {path:?}: no service definition");
                    None
                }
            }
        })
        .collect();

    services.sort_by(|a, b| a.path.cmp(&b.path));

    for service in &services {
        info!("Found service directory: {}", service.name());
    }

    Ok(services)
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read services directory {1:?}: {0}")]
    ReadRoot(#[source] io::Error, PathBuf),
}
