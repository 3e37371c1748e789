//! JSON error responses for the HTTP API

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use relserve_core::{CatalogError, DownloadError};
use serde_json::json;
use tracing::error;

/// Errors returned by request handlers.
///
/// Every variant renders as `{"error": "<message>"}` with its status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Catalog is empty
    #[error("No releases found")]
    NoReleases,

    /// Requested download does not exist
    #[error("File not found")]
    FileNotFound,

    /// Requested download name is not a plain filename
    #[error("Invalid filename")]
    InvalidFilename,

    /// Releases directory could not be scanned
    #[error("Failed to read releases")]
    Catalog(#[from] CatalogError),

    /// Download could not be resolved
    #[error("Failed to read file")]
    Io(#[source] std::io::Error),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoReleases | ApiError::FileNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidFilename => StatusCode::BAD_REQUEST,
            ApiError::Catalog(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::InvalidFilename { .. } => ApiError::InvalidFilename,
            DownloadError::FileNotFound { .. } => ApiError::FileNotFound,
            DownloadError::Io(e) => ApiError::Io(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Catalog(e) => error!("Catalog query failed: {e}"),
            ApiError::Io(e) => error!("Download failed: {e}"),
            _ => {}
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::NoReleases.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::FileNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::InvalidFilename.status(), StatusCode::BAD_REQUEST);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let catalog = CatalogError::DirectoryAccess {
            path: "releases".into(),
            source: io,
        };
        assert_eq!(
            ApiError::from(catalog).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_download_errors_convert() {
        let err = ApiError::from(DownloadError::InvalidFilename {
            name: "../x".to_string(),
        });
        assert!(matches!(err, ApiError::InvalidFilename));

        let err = ApiError::from(DownloadError::FileNotFound {
            name: "x".to_string(),
        });
        assert_eq!(err.to_string(), "File not found");
    }
}
