//! Relserve Core - Release catalog for installer distribution
//!
//! Derives release metadata from installer filenames in a releases
//! directory, orders releases by semantic version, and resolves download
//! requests to files on disk. The directory is the only source of truth;
//! nothing is cached between queries.

pub mod catalog;
pub mod config;
pub mod download;
pub mod tracing_setup;
pub mod version;

// Re-export main types for convenient access
pub use catalog::{Asset, CatalogError, Release, ReleaseCatalog};
pub use config::{ScanPolicy, ServerConfig};
pub use download::{DownloadError, resolve_download};
pub use version::{FilenameMatch, ReleaseVersion, derive_version, match_installer};

/// Core errors that can bubble up from any Relserve subsystem.
#[derive(Debug, thiserror::Error)]
pub enum RelserveError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelserveError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            RelserveError::Catalog(CatalogError::DirectoryAccess { path, .. }) => {
                format!("Releases directory {} is not readable", path.display())
            }
            RelserveError::Catalog(CatalogError::FileAccess { path, .. }) => {
                format!("Installer {} could not be read", path.display())
            }
            RelserveError::Configuration { reason } => format!("Configuration error: {reason}"),
            RelserveError::Io(_) => "File system error occurred".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelserveError>;
