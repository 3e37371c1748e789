//! Resolution of download requests to files in the releases directory.
//!
//! Only plain filenames are accepted, and the resolved path must stay inside
//! the releases directory after symlinks are followed.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Errors that occur while resolving a download request.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Filename is not a single plain path component
    #[error("Invalid filename: {name}")]
    InvalidFilename {
        /// Rejected filename
        name: String,
    },

    /// No regular file with this name exists in the releases directory
    #[error("File not found: {name}")]
    FileNotFound {
        /// Requested filename
        name: String,
    },

    /// Standard I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Checks that `name` is a single plain path component.
///
/// Without separators a name can only leave the directory as `.` or `..`,
/// so names like `setup.exe..bak` are accepted.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Canonical path of `name` inside the canonical directory `root`, or `None`
/// when symlinks take it outside `root`.
///
/// # Errors
/// - `std::io::Error` - Path is missing or cannot be resolved
pub async fn contained_path(root: &Path, name: &str) -> std::io::Result<Option<PathBuf>> {
    let resolved = tokio::fs::canonicalize(root.join(name)).await?;
    Ok(resolved.starts_with(root).then_some(resolved))
}

/// Resolves `name` to a regular file inside `releases_dir`.
///
/// # Errors
/// - `DownloadError::InvalidFilename` - Name is not a plain filename
/// - `DownloadError::FileNotFound` - File is missing, not a regular file, or escapes the directory
/// - `DownloadError::Io` - Releases directory could not be resolved
pub async fn resolve_download(releases_dir: &Path, name: &str) -> Result<PathBuf, DownloadError> {
    if !is_safe_filename(name) {
        warn!("Rejected download request for unsafe filename {name:?}");
        return Err(DownloadError::InvalidFilename {
            name: name.to_string(),
        });
    }

    let not_found = || DownloadError::FileNotFound {
        name: name.to_string(),
    };

    let root = tokio::fs::canonicalize(releases_dir).await?;
    let resolved = match contained_path(&root, name).await {
        Ok(Some(path)) => path,
        Ok(None) => {
            warn!("Download {name:?} resolves outside releases directory");
            return Err(not_found());
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    match tokio::fs::metadata(&resolved).await {
        Ok(metadata) if metadata.is_file() => Ok(resolved),
        Ok(_) => Err(not_found()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_is_safe_filename() {
        assert!(is_safe_filename("medplum-agent-installer-1.2.3.exe"));
        assert!(is_safe_filename("notes.md"));
        assert!(is_safe_filename(".hidden"));
        assert!(is_safe_filename("medplum-agent-installer-1.0.0.exe..bak"));
        assert!(is_safe_filename("..hidden"));

        for name in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", "..\\x", "x\0y"] {
            assert!(!is_safe_filename(name), "{name:?}");
        }
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.md"), b"hello").unwrap();

        let path = resolve_download(dir.path(), "notes.md").await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_resolve_name_containing_double_dot() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("medplum-agent-installer-1.0.0.exe..bak"), b"bak").unwrap();

        let path = resolve_download(dir.path(), "medplum-agent-installer-1.0.0.exe..bak")
            .await
            .unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"bak");
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let dir = TempDir::new().unwrap();

        let err = resolve_download(dir.path(), "absent.exe").await.unwrap_err();

        assert!(matches!(err, DownloadError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let releases = dir.path().join("releases");
        std::fs::create_dir(&releases).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let err = resolve_download(&releases, "../secret.txt")
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::InvalidFilename { .. }));
    }

    #[tokio::test]
    async fn test_resolve_rejects_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let err = resolve_download(dir.path(), "nested").await.unwrap_err();

        assert!(matches!(err, DownloadError::FileNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_symlink_escape() {
        let dir = TempDir::new().unwrap();
        let releases = dir.path().join("releases");
        std::fs::create_dir(&releases).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
        std::os::unix::fs::symlink(dir.path().join("secret.txt"), releases.join("link.exe"))
            .unwrap();

        let err = resolve_download(&releases, "link.exe").await.unwrap_err();

        assert!(matches!(err, DownloadError::FileNotFound { .. }));
    }
}
