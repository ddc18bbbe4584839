//! JSON session file holding the groups that were open at quit.

use std::path::{Path, PathBuf};
use std::{fs, io};

use thiserror::Error;
use tracing::{debug, info};

use super::snapshot::GroupSnapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Session file {path} is malformed: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

pub fn save_session(path: &Path, snapshots: &[GroupSnapshot]) -> Result<(), StoreError> {
    let buf = serde_json::to_string_pretty(snapshots)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
    }
    fs::write(path, buf).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
    info!(groups = snapshots.len(), path = %path.display(), "Saved session");
    Ok(())
}

/// Reads the pending session, if any.
///
/// A missing file and an empty list both mean there is nothing to restore.
pub fn load_session(path: &Path) -> Result<Option<Vec<GroupSnapshot>>, StoreError> {
    let buf = match fs::read_to_string(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No session file");
            return Ok(None);
        }
        Err(source) => return Err(StoreError::Io { path: path.to_path_buf(), source }),
    };
    let snapshots: Vec<GroupSnapshot> = serde_json::from_str(&buf)
        .map_err(|source| StoreError::Decode { path: path.to_path_buf(), source })?;
    if snapshots.is_empty() {
        return Ok(None);
    }
    Ok(Some(snapshots))
}
