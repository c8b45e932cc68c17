//! Copying data locations out of containers
//!

use core::time::Duration;
use std::{
    io,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::{io::AsyncWriteExt, task, time::timeout};
use tracing::{debug, warn};

use crate::runtime::{ContainerRuntime, RuntimeError};

/// The directory a target's data locations are extracted into for a run.
pub fn target_directory(backup_root: &Path, container: &str, timestamp: &str) -> PathBuf {
    backup_root.join(format!("{container}_{timestamp}"))
}

/// Turn an absolute in-container path into a single directory name.
///
/// Path components are joined with `_`. A `_` or `%` inside a component is percent encoded
/// so that two different paths never produce the same name. The root path becomes `_`.
pub fn location_directory_name(location: &str) -> String {
    let components: Vec<String> = location
        .split('/')
        .filter(|component| !component.is_empty())
        .map(|component| match component {
            "." => "%2E".to_string(),
            ".." => "%2E%2E".to_string(),
            _ => component.replace('%', "%25").replace('_', "%5F"),
        })
        .collect();

    if components.is_empty() {
        "_".to_string()
    } else {
        components.join("_")
    }
}

/// Copy `location` out of `container` into its own directory under `target_directory`.
///
/// The archive is streamed into a temporary file next to the destination, extracted, then
/// removed. Returns the destination directory.
pub async fn transfer_location<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    container: &str,
    location: &str,
    target_directory: &Path,
    archive_timeout: Duration,
) -> Result<PathBuf, TransferFailure> {
    let destination = target_directory.join(location_directory_name(location));

    // Create the destination
    tokio::fs::create_dir_all(target_directory)
        .await
        .map_err(|e| TransferFailure::CreateDirectory(e, target_directory.to_path_buf()))?;
    tokio::fs::create_dir(&destination)
        .await
        .map_err(|e| TransferFailure::CreateDirectory(e, destination.clone()))?;

    // Stream the archive into a temporary file
    let archive = tempfile::Builder::new()
        .prefix(".archive-")
        .suffix(".tar")
        .tempfile_in(target_directory)
        .map_err(TransferFailure::TempFile)?;

    let bytes = {
        let file = archive.reopen().map_err(TransferFailure::TempFile)?;
        let mut file = tokio::fs::File::from_std(file);

        let bytes = timeout(
            archive_timeout,
            runtime.get_archive(container, location, &mut file),
        )
        .await
        .map_err(|_| TransferFailure::Timeout(archive_timeout))??;

        file.flush().await.map_err(TransferFailure::TempFile)?;
        bytes
    };
    debug!("Received {bytes} bytes for {location}");

    if bytes == 0 {
        return Err(TransferFailure::EmptyArchive);
    }

    // Extract off the async executor
    let extract_to = destination.clone();
    task::spawn_blocking(move || extract(archive, &extract_to))
        .await
        .map_err(|e| TransferFailure::Extract(io::Error::other(e)))??;

    Ok(destination)
}

fn extract(archive: NamedTempFile, destination: &Path) -> Result<(), TransferFailure> {
    let file = archive.reopen().map_err(TransferFailure::TempFile)?;
    tar::Archive::new(file)
        .unpack(destination)
        .map_err(TransferFailure::Extract)?;

    if let Err(error) = archive.close() {
        warn!("Could not remove temporary archive: {error}");
    }

    Ok(())
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum TransferFailure {
    #[error("Failed to create directory {1:?}: {0}")]
    CreateDirectory(#[source] io::Error, PathBuf),

    #[error("Failed to create temporary archive: {0}")]
    TempFile(#[source] io::Error),

    #[error("Failed to retrieve archive: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Retrieving archive timed out after {0:?}")]
    Timeout(Duration),

    #[error("Container returned an empty archive")]
    EmptyArchive,

    #[error("Failed to extract archive: {0}")]
    Extract(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{location_directory_name, target_directory};

    #[test]
    fn plain_paths_join_with_underscore() {
        assert_eq!(location_directory_name("/data"), "data");
        assert_eq!(location_directory_name("/var/lib/xp/"), "var_lib_xp");
        assert_eq!(location_directory_name("//var//lib"), "var_lib");
    }

    #[test]
    fn root_and_dot_components() {
        assert_eq!(location_directory_name("/"), "_");
        assert_eq!(location_directory_name("/.."), "%2E%2E");
        assert_eq!(location_directory_name("/."), "%2E");
    }

    #[test]
    fn underscores_cannot_collide() {
        let a = location_directory_name("/a/b_c");
        let b = location_directory_name("/a_b/c");
        let c = location_directory_name("/a/b/c");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_ne!(location_directory_name("/a%5Fb"), location_directory_name("/a_b"));
    }

    #[test]
    fn prefix_overlap_is_distinct() {
        assert_ne!(location_directory_name("/data"), location_directory_name("/data/sub"));
    }

    #[test]
    fn target_directory_uses_container_and_timestamp() {
        let directory = target_directory(Path::new("/backup"), "shop_web_1", "2024-01-02_03.04.05");
        assert_eq!(directory, Path::new("/backup/shop_web_1_2024-01-02_03.04.05"));
    }
}
