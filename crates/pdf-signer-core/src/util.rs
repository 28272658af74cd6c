//! Utility functions shared across the crate.

use std::path::{Path, PathBuf};

use crate::error::{Error, FileKind, Result};

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Get the user's data directory following XDG conventions.
///
/// Returns `$XDG_DATA_HOME` if set, otherwise `$HOME/.local/share`.
pub fn data_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_DATA_HOME").map(PathBuf::from).or_else(|| {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
    })
}

/// Directory holding the overlay and UI-state files by default.
pub fn default_state_dir() -> PathBuf {
    data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("pdf-signer")
}

/// Current local time as an ISO 8601 string, the format used by both store files.
pub fn timestamp_now() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Fail with [`Error::FileNotFound`] unless `path` exists.
pub fn require_file(kind: FileKind, path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::FileNotFound {
            kind,
            path: path.to_path_buf(),
        })
    }
}

/// `<stem>_signed.pdf` next to the input document.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_signed.pdf"))
}

/// Write `bytes` to `path` through a temporary sibling and one rename.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Whether two paths name the same file. Paths that do not exist yet are
/// compared after making them absolute.
pub fn same_file(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| {
        p.canonicalize()
            .or_else(|_| std::path::absolute(p))
            .unwrap_or_else(|_| p.to_path_buf())
    };
    normalize(a) == normalize(b)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let out = default_output_path(Path::new("/docs/contract.pdf"));
        assert_eq!(out, PathBuf::from("/docs/contract_signed.pdf"));
    }

    #[test]
    fn test_require_file_missing() {
        let err = require_file(FileKind::Signature, Path::new("/nonexistent/sign.png"));
        assert!(matches!(
            err,
            Err(Error::FileNotFound { kind: FileKind::Signature, .. })
        ));
    }

    #[test]
    fn test_timestamp_is_iso8601() {
        let ts = timestamp_now();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_write_bytes_atomic_and_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.pdf");
        write_bytes_atomic(&path, b"%PDF-1.5").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");
        assert!(same_file(&path, &dir.path().join("nested/./out.pdf")));
        assert!(!same_file(&path, &dir.path().join("other.pdf")));
    }
}
