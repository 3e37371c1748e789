//! Release catalog and installer download handlers

use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request, State};
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::HeaderValue;
use axum::response::{Json, Response};
use relserve_core::{Release, resolve_download};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::server::AppState;

/// Body of `/releases/all.json`.
#[derive(Debug, Serialize)]
pub struct AllReleases {
    /// Every release, newest first
    pub versions: Vec<Release>,
}

/// `GET /releases/all.json`
pub async fn all_releases(State(state): State<AppState>) -> Result<Json<AllReleases>, ApiError> {
    let versions = state.catalog.build_catalog().await?;
    debug!("Serving {} releases", versions.len());
    Ok(Json(AllReleases { versions }))
}

/// `GET /releases/latest.json`
pub async fn latest_release(State(state): State<AppState>) -> Result<Json<Release>, ApiError> {
    state
        .catalog
        .latest()
        .await?
        .map(Json)
        .ok_or(ApiError::NoReleases)
}

/// `GET /releases/download/{filename}`
///
/// Streams the file as an attachment. Any file in the releases directory can
/// be fetched by exact name, installer or not.
pub async fn download_release(
    State(state): State<AppState>,
    filename: Result<Path<String>, PathRejection>,
    request: Request,
) -> Result<Response, ApiError> {
    let Path(filename) = filename.map_err(|rejection| {
        warn!("Rejected download request: {rejection}");
        ApiError::InvalidFilename
    })?;
    let path = resolve_download(state.catalog.releases_dir(), &filename).await?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    info!("Download requested: {filename}");
    let response = ServeFile::new_with_mime(&path, &mime)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    let mut response = response.map(Body::new);
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(CONTENT_DISPOSITION, attachment_header(&filename));
    }
    Ok(response)
}

/// `attachment; filename="<name>"`, or a bare `attachment` when the name is
/// not representable in a header.
fn attachment_header(filename: &str) -> HeaderValue {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_str(&format!("attachment; filename=\"{escaped}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
