//! Download endpoint behavior and traversal protection

use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde_json::json;

use crate::common::{TestServer, body_bytes, download_path};

#[tokio::test]
async fn test_download_urls_round_trip() {
    let server = TestServer::new();
    let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    server.add_file("medplum-agent-installer-3.2.1.exe", &payload);
    server.add_installer("3.2.0");

    let (_, all) = server.get_json("/releases/all.json").await;
    for release in all["versions"].as_array().unwrap() {
        let asset = &release["assets"][0];
        let name = asset["name"].as_str().unwrap();
        let url = asset["browser_download_url"].as_str().unwrap();

        let response = server.get(download_path(url)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let expected = std::fs::read(server.dir.path().join(name)).unwrap();
        assert_eq!(body_bytes(response).await, expected);
    }
}

#[tokio::test]
async fn test_download_sets_attachment_headers() {
    let server = TestServer::new();
    let name = server.add_installer("1.0.0");

    let response = server.get(&format!("/releases/download/{name}")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        format!("attachment; filename=\"{name}\"").as_str()
    );
    assert!(response.headers().contains_key(CONTENT_TYPE));
}

#[tokio::test]
async fn test_non_installer_downloadable_by_exact_name() {
    let server = TestServer::new();
    server.add_file("notes.md", b"# notes");

    let response = server.get("/releases/download/notes.md").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"# notes");
}

#[tokio::test]
async fn test_download_missing_file() {
    let server = TestServer::new();

    let (status, body) = server
        .get_json("/releases/download/medplum-agent-installer-9.9.9.exe")
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "File not found" }));
}

#[tokio::test]
async fn test_download_rejects_encoded_traversal() {
    let server = TestServer::new();
    let outside = server.dir.path().parent().unwrap().join("outside-secret.txt");
    std::fs::write(&outside, b"secret").unwrap();

    let (status, body) = server
        .get_json("/releases/download/..%2Foutside-secret.txt")
        .await;
    std::fs::remove_file(&outside).unwrap();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid filename" }));
}

#[tokio::test]
async fn test_download_rejects_parent_directory() {
    let server = TestServer::new();

    let (status, _) = server.get_json("/releases/download/..").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_supports_range_requests() {
    let server = TestServer::new();
    server.add_file("medplum-agent-installer-1.0.0.exe", b"0123456789");

    let request = axum::http::Request::builder()
        .uri("/releases/download/medplum-agent-installer-1.0.0.exe")
        .header("range", "bytes=2-5")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(server.app.clone(), request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, b"2345");
}

#[tokio::test]
async fn test_download_rejects_non_utf8_filename() {
    let server = TestServer::new();

    let (status, body) = server.get_json("/releases/download/%FF.exe").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid filename" }));
}

#[tokio::test]
async fn test_listed_name_with_double_dot_is_downloadable() {
    let server = TestServer::new();
    server.add_file("medplum-agent-installer-1.0.0.exe..bak", b"backup");

    let (_, all) = server.get_json("/releases/all.json").await;
    let asset = &all["versions"][0]["assets"][0];
    assert_eq!(asset["name"], "medplum-agent-installer-1.0.0.exe..bak");

    let url = asset["browser_download_url"].as_str().unwrap();
    let response = server.get(download_path(url)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"backup");
}

#[cfg(unix)]
#[tokio::test]
async fn test_installer_link_outside_directory_is_neither_listed_nor_served() {
    let server = TestServer::new();
    server.add_installer("1.0.0");
    let outside = tempfile::TempDir::new().unwrap();
    let target = outside.path().join("secret.exe");
    std::fs::write(&target, b"secret").unwrap();
    std::os::unix::fs::symlink(
        &target,
        server.dir.path().join("medplum-agent-installer-2.0.0.exe"),
    )
    .unwrap();

    let (_, all) = server.get_json("/releases/all.json").await;
    let versions = all["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0]["version"], "1.0.0");

    let (_, latest) = server.get_json("/releases/latest.json").await;
    assert_eq!(latest["version"], "1.0.0");

    let (status, body) = server
        .get_json("/releases/download/medplum-agent-installer-2.0.0.exe")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "File not found" }));
}
