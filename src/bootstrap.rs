//! Storage bootstrap and raw data-file access.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::config::StoragePaths;
use crate::errors::{SyncError, SyncResult};
use crate::input_validator::validate_file_name;

/// Create the storage root and touch every backing file. Existing content
/// is never truncated.
pub fn bootstrap(paths: &StoragePaths) -> SyncResult<()> {
    fs::create_dir_all(&paths.root)
        .map_err(|e| SyncError::storage("creating storage root", e))?;

    for path in paths.all_files() {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SyncError::storage(format!("creating {}", path.display()), e))?;
    }

    tracing::info!(root = %paths.root.display(), "storage bootstrapped");
    Ok(())
}

/// Names of the regular files in the storage root, sorted.
pub fn list_data_files(root: &Path) -> SyncResult<Vec<String>> {
    let entries = fs::read_dir(root).map_err(|_| SyncError::storage_unavailable(root))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|_| SyncError::storage_unavailable(root))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}

/// Resolve a download request to a file directly inside the storage root.
pub fn resolve_data_file(root: &Path, name: &str) -> SyncResult<PathBuf> {
    validate_file_name(name)?;
    let path = root.join(name);
    if !path.is_file() {
        return Err(SyncError::not_found("file", name));
    }
    Ok(path)
}
