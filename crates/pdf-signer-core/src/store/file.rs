use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Read and parse a JSON file, treating every failure as "nothing saved".
pub fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No store file at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

/// Serialize `value` as pretty JSON and replace `path` in one rename.
///
/// Readers see either the previous content or the new content, never a
/// partial write.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let store_err = |reason: String| Error::StoreWrite {
        path: path.to_path_buf(),
        reason,
    };

    let mut json = serde_json::to_vec_pretty(value).map_err(|e| store_err(e.to_string()))?;
    json.push(b'\n');

    crate::util::write_bytes_atomic(path, &json).map_err(|e| store_err(e.to_string()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Delete a store file; a missing file is not an error.
pub fn remove_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::StoreWrite {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
