//! Release catalog built from the installer files in the releases directory.
//!
//! The catalog is never cached. Every query rescans the directory so that
//! dropping or removing an installer is visible on the next request.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::config::{ScanPolicy, ServerConfig};
use crate::download::{contained_path, is_safe_filename};
use crate::version::{FilenameMatch, ReleaseVersion, match_installer};

/// URL path segment under which installer files are served.
pub const DOWNLOAD_PATH: &str = "/releases/download";

/// Single downloadable artifact attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    /// Original filename in the releases directory
    pub name: String,
    /// Public URL the file can be downloaded from
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// One installable version, derived from an installer file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    /// Release tag, always `v` followed by the version
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Version parsed from the installer filename
    pub version: ReleaseVersion,
    /// Last modification time of the installer file
    #[serde(serialize_with = "serialize_timestamp")]
    pub published_at: DateTime<Utc>,
    /// Files attached to the release
    pub assets: Vec<Asset>,
}

impl Release {
    /// Builds the release record for an installer file.
    pub fn from_installer(
        version: ReleaseVersion,
        filename: &str,
        modified: SystemTime,
        base_url: &str,
    ) -> Self {
        Self {
            tag: version.tag(),
            version,
            published_at: DateTime::<Utc>::from(modified),
            assets: vec![Asset {
                name: filename.to_string(),
                download_url: download_url(base_url, filename),
            }],
        }
    }

    /// Filename of the installer this release was derived from.
    pub fn filename(&self) -> Option<&str> {
        self.assets.first().map(|asset| asset.name.as_str())
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Builds the public download URL for a file in the releases directory.
///
/// # Examples
/// ```
/// use relserve_core::catalog::download_url;
///
/// assert_eq!(
///     download_url("https://example.com/", "setup.exe"),
///     "https://example.com/releases/download/setup.exe"
/// );
/// ```
pub fn download_url(base_url: &str, filename: &str) -> String {
    format!(
        "{}{DOWNLOAD_PATH}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(filename)
    )
}

/// Errors raised while scanning the releases directory.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The releases directory is missing or unreadable
    #[error("Cannot read releases directory {}: {source}", path.display())]
    DirectoryAccess {
        /// Directory that could not be listed
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Metadata lookup for an installer failed mid-scan
    #[error("Cannot read metadata for {}: {source}", path.display())]
    FileAccess {
        /// File whose metadata could not be read
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },
}

/// Builds release catalogs from a releases directory.
///
/// Stateless: holds only the configuration needed to scan and to build
/// download URLs.
#[derive(Debug, Clone)]
pub struct ReleaseCatalog {
    releases_dir: PathBuf,
    base_url: String,
    scan_policy: ScanPolicy,
}

impl ReleaseCatalog {
    /// Creates a catalog over `releases_dir` publishing links under `base_url`.
    pub fn new(releases_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            releases_dir: releases_dir.into(),
            base_url: base_url.into(),
            scan_policy: ScanPolicy::default(),
        }
    }

    /// Creates a catalog from server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.releases_dir.clone(), config.base_url.clone())
            .with_scan_policy(config.scan_policy)
    }

    /// Sets how unreadable installer entries are handled.
    pub fn with_scan_policy(mut self, scan_policy: ScanPolicy) -> Self {
        self.scan_policy = scan_policy;
        self
    }

    /// Directory scanned for installers.
    pub fn releases_dir(&self) -> &Path {
        &self.releases_dir
    }

    /// Scans the releases directory and returns all releases, newest first.
    ///
    /// Entries whose name is not an installer, and entries that resolve
    /// outside the releases directory, are skipped. Releases with equal
    /// versions are ordered by filename.
    ///
    /// # Errors
    /// - `CatalogError::DirectoryAccess` - Releases directory missing or unreadable
    /// - `CatalogError::FileAccess` - Installer metadata unreadable under `ScanPolicy::Strict`
    pub async fn build_catalog(&self) -> Result<Vec<Release>, CatalogError> {
        let directory_error = |source: std::io::Error| CatalogError::DirectoryAccess {
            path: self.releases_dir.clone(),
            source,
        };

        let root = tokio::fs::canonicalize(&self.releases_dir)
            .await
            .map_err(directory_error)?;
        let mut entries = tokio::fs::read_dir(&root).await.map_err(directory_error)?;
        let mut releases = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(directory_error)? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let FilenameMatch::Installer(version) = match_installer(name) else {
                continue;
            };
            if !is_safe_filename(name) {
                continue;
            }

            // Only list what the download route will serve.
            let path = entry.path();
            let resolved = match contained_path(&root, name).await {
                Ok(Some(resolved)) => resolved,
                Ok(None) => {
                    warn!(
                        "Skipping installer {} that resolves outside the releases directory",
                        path.display()
                    );
                    continue;
                }
                Err(source) => {
                    self.unreadable(path, source)?;
                    continue;
                }
            };

            let metadata = match tokio::fs::metadata(&resolved).await {
                Ok(metadata) => metadata,
                Err(source) => {
                    self.unreadable(path, source)?;
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(source) => {
                    self.unreadable(path, source)?;
                    continue;
                }
            };

            releases.push(Release::from_installer(
                version,
                name,
                modified,
                &self.base_url,
            ));
        }

        sort_releases(&mut releases);
        debug!(
            "Built catalog of {} releases from {}",
            releases.len(),
            self.releases_dir.display()
        );
        Ok(releases)
    }

    /// Applies the scan policy to an installer whose metadata cannot be read.
    fn unreadable(&self, path: PathBuf, source: std::io::Error) -> Result<(), CatalogError> {
        match self.scan_policy {
            ScanPolicy::Strict => Err(CatalogError::FileAccess { path, source }),
            ScanPolicy::SkipUnreadable => {
                warn!("Skipping unreadable installer {}: {}", path.display(), source);
                Ok(())
            }
        }
    }

    /// Returns the highest-version release, if any.
    ///
    /// # Errors
    /// Same as [`ReleaseCatalog::build_catalog`].
    pub async fn latest(&self) -> Result<Option<Release>, CatalogError> {
        Ok(self.build_catalog().await?.into_iter().next())
    }

    /// Creates the releases directory if it does not exist yet.
    ///
    /// # Errors
    /// - `CatalogError::DirectoryAccess` - Directory could not be created
    pub async fn ensure_releases_dir(&self) -> Result<(), CatalogError> {
        tokio::fs::create_dir_all(&self.releases_dir)
            .await
            .map_err(|source| CatalogError::DirectoryAccess {
                path: self.releases_dir.clone(),
                source,
            })
    }
}

/// Orders releases newest first, breaking version ties by filename.
pub fn sort_releases(releases: &mut [Release]) {
    releases.sort_by(|a, b| {
        a.version
            .cmp_descending(&b.version)
            .then_with(|| a.filename().cmp(&b.filename()))
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    const BASE_URL: &str = "http://localhost:5001";

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), name.as_bytes()).unwrap();
    }

    fn versions(releases: &[Release]) -> Vec<String> {
        releases.iter().map(|r| r.version.to_string()).collect()
    }

    #[tokio::test]
    async fn test_catalog_orders_by_descending_version() {
        let dir = TempDir::new().unwrap();
        for version in ["1.0.0", "2.1.0", "1.9.9"] {
            touch(dir.path(), &format!("medplum-agent-installer-{version}.exe"));
        }

        let catalog = ReleaseCatalog::new(dir.path(), BASE_URL);
        let releases = catalog.build_catalog().await.unwrap();

        assert_eq!(versions(&releases), ["2.1.0", "1.9.9", "1.0.0"]);
    }

    #[tokio::test]
    async fn test_catalog_skips_non_installers() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.md");
        touch(dir.path(), "medplum-agent-installer-v1.exe");
        touch(dir.path(), "medplum-agent-installer-1.2.exe");
        touch(dir.path(), "medplum-agent-installer-3.0.1.exe");

        let releases = ReleaseCatalog::new(dir.path(), BASE_URL)
            .build_catalog()
            .await
            .unwrap();

        assert_eq!(versions(&releases), ["3.0.1"]);
    }

    #[tokio::test]
    async fn test_release_fields() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "medplum-agent-installer-4.5.6.exe");

        let releases = ReleaseCatalog::new(dir.path(), "https://dl.example.com/")
            .build_catalog()
            .await
            .unwrap();
        let release = &releases[0];

        assert_eq!(release.tag, "v4.5.6");
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].name, "medplum-agent-installer-4.5.6.exe");
        assert_eq!(
            release.assets[0].download_url,
            "https://dl.example.com/releases/download/medplum-agent-installer-4.5.6.exe"
        );

        let modified = std::fs::metadata(dir.path().join("medplum-agent-installer-4.5.6.exe"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(release.published_at, DateTime::<Utc>::from(modified));
    }

    #[tokio::test]
    async fn test_release_json_shape() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_millis(1_714_564_800_250);
        let release = Release::from_installer(
            ReleaseVersion::new(1, 2, 3),
            "medplum-agent-installer-1.2.3.exe",
            modified,
            BASE_URL,
        );

        let json = serde_json::to_value(&release).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tag_name": "v1.2.3",
                "version": "1.2.3",
                "published_at": "2024-05-01T12:00:00.250Z",
                "assets": [{
                    "name": "medplum-agent-installer-1.2.3.exe",
                    "browser_download_url": "http://localhost:5001/releases/download/medplum-agent-installer-1.2.3.exe"
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_latest_on_empty_directory() {
        let dir = TempDir::new().unwrap();
        let catalog = ReleaseCatalog::new(dir.path(), BASE_URL);

        assert!(catalog.build_catalog().await.unwrap().is_empty());
        assert_eq!(catalog.latest().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_latest_returns_highest_version() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "medplum-agent-installer-0.9.0.exe");
        touch(dir.path(), "medplum-agent-installer-0.10.0.exe");

        let latest = ReleaseCatalog::new(dir.path(), BASE_URL)
            .latest()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(latest.version, ReleaseVersion::new(0, 10, 0));
    }

    #[tokio::test]
    async fn test_missing_directory_is_directory_access_error() {
        let dir = TempDir::new().unwrap();
        let catalog = ReleaseCatalog::new(dir.path().join("absent"), BASE_URL);

        let err = catalog.build_catalog().await.unwrap_err();
        assert!(matches!(err, CatalogError::DirectoryAccess { .. }));
    }

    #[tokio::test]
    async fn test_equal_versions_order_by_filename() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b-medplum-agent-installer-1.0.0.exe");
        touch(dir.path(), "a-medplum-agent-installer-1.0.0.exe");
        touch(dir.path(), "medplum-agent-installer-2.0.0.exe");

        let releases = ReleaseCatalog::new(dir.path(), BASE_URL)
            .build_catalog()
            .await
            .unwrap();
        let names: Vec<&str> = releases.iter().filter_map(Release::filename).collect();

        assert_eq!(
            names,
            [
                "medplum-agent-installer-2.0.0.exe",
                "a-medplum-agent-installer-1.0.0.exe",
                "b-medplum-agent-installer-1.0.0.exe",
            ]
        );
    }

    #[tokio::test]
    async fn test_matching_directory_is_excluded() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("medplum-agent-installer-9.9.9.exe")).unwrap();
        touch(dir.path(), "medplum-agent-installer-1.0.0.exe");

        let releases = ReleaseCatalog::new(dir.path(), BASE_URL)
            .build_catalog()
            .await
            .unwrap();

        assert_eq!(versions(&releases), ["1.0.0"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_installer_link_respects_scan_policy() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "medplum-agent-installer-1.0.0.exe");
        std::os::unix::fs::symlink(
            dir.path().join("gone.exe"),
            dir.path().join("medplum-agent-installer-2.0.0.exe"),
        )
        .unwrap();

        let lenient = ReleaseCatalog::new(dir.path(), BASE_URL);
        assert_eq!(versions(&lenient.build_catalog().await.unwrap()), ["1.0.0"]);

        let strict = lenient.with_scan_policy(ScanPolicy::Strict);
        let err = strict.build_catalog().await.unwrap_err();
        assert!(matches!(err, CatalogError::FileAccess { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installer_link_outside_directory_is_excluded() {
        let outside = TempDir::new().unwrap();
        touch(outside.path(), "payload.exe");
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "medplum-agent-installer-1.0.0.exe");
        std::os::unix::fs::symlink(
            outside.path().join("payload.exe"),
            dir.path().join("medplum-agent-installer-2.0.0.exe"),
        )
        .unwrap();

        for policy in [ScanPolicy::SkipUnreadable, ScanPolicy::Strict] {
            let catalog = ReleaseCatalog::new(dir.path(), BASE_URL).with_scan_policy(policy);
            assert_eq!(versions(&catalog.build_catalog().await.unwrap()), ["1.0.0"]);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installer_link_inside_directory_is_listed() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "build-output.bin");
        std::os::unix::fs::symlink(
            dir.path().join("build-output.bin"),
            dir.path().join("medplum-agent-installer-2.0.0.exe"),
        )
        .unwrap();

        let releases = ReleaseCatalog::new(dir.path(), BASE_URL)
            .build_catalog()
            .await
            .unwrap();

        assert_eq!(versions(&releases), ["2.0.0"]);
    }

    #[tokio::test]
    async fn test_ensure_releases_dir_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("releases");
        let catalog = ReleaseCatalog::new(&nested, BASE_URL);

        catalog.ensure_releases_dir().await.unwrap();

        assert!(nested.is_dir());
        assert!(catalog.build_catalog().await.unwrap().is_empty());
    }

    #[test]
    fn test_download_url_encodes_filename() {
        assert_eq!(
            download_url(BASE_URL, "my installer.exe"),
            "http://localhost:5001/releases/download/my%20installer.exe"
        );
    }
}
