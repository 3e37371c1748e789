//! Shared fixtures for HTTP integration tests

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use relserve_core::ServerConfig;
use relserve_web::{AppState, router};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BASE_URL: &str = "https://releases.example.com";

/// Temporary releases directory with a router serving it.
pub struct TestServer {
    pub dir: TempDir,
    pub app: Router,
}

impl TestServer {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig::default()
            .with_releases_dir(dir.path())
            .with_base_url(BASE_URL);
        let app = router(AppState::new(config));
        Self { dir, app }
    }

    pub fn add_file(&self, name: &str, contents: &[u8]) {
        std::fs::write(self.dir.path().join(name), contents).unwrap();
    }

    pub fn add_installer(&self, version: &str) -> String {
        let name = format!("medplum-agent-installer-{version}.exe");
        self.add_file(&name, format!("installer {version}").as_bytes());
        name
    }

    pub async fn get(&self, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = self.get(uri).await;
        let status = response.status();
        let body = body_bytes(response).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Path portion of a download URL, relative to the base URL.
pub fn download_path(url: &str) -> &str {
    url.strip_prefix(BASE_URL).unwrap()
}
