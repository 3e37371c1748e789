//! Catalog endpoint behavior: all.json and latest.json

use axum::http::StatusCode;
use serde_json::json;

use crate::common::{BASE_URL, TestServer};

#[tokio::test]
async fn test_all_releases_empty_directory() {
    let server = TestServer::new();

    let (status, body) = server.get_json("/releases/all.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "versions": [] }));
}

#[tokio::test]
async fn test_latest_release_empty_directory() {
    let server = TestServer::new();

    let (status, body) = server.get_json("/releases/latest.json").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "No releases found" }));
}

#[tokio::test]
async fn test_all_releases_descending_order() {
    let server = TestServer::new();
    for version in ["1.0.0", "2.1.0", "1.9.9"] {
        server.add_installer(version);
    }

    let (status, body) = server.get_json("/releases/all.json").await;

    assert_eq!(status, StatusCode::OK);
    let versions: Vec<&str> = body["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions, ["2.1.0", "1.9.9", "1.0.0"]);
}

#[tokio::test]
async fn test_latest_release_shape() {
    let server = TestServer::new();
    server.add_installer("1.0.0");
    let name = server.add_installer("1.10.2");

    let (status, body) = server.get_json("/releases/latest.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tag_name"], "v1.10.2");
    assert_eq!(body["version"], "1.10.2");
    assert_eq!(
        body["assets"],
        json!([{
            "name": name,
            "browser_download_url": format!("{BASE_URL}/releases/download/{name}"),
        }])
    );

    let published_at = body["published_at"].as_str().unwrap();
    assert!(published_at.ends_with('Z'), "{published_at}");
    assert_eq!(published_at.len(), "2024-05-01T12:00:00.000Z".len());
}

#[tokio::test]
async fn test_non_installers_are_hidden() {
    let server = TestServer::new();
    server.add_file("notes.md", b"notes");
    server.add_file("medplum-agent-installer-v1.exe", b"bogus");
    server.add_installer("0.1.0");

    let (_, all) = server.get_json("/releases/all.json").await;
    let (_, latest) = server.get_json("/releases/latest.json").await;

    let serialized = format!("{all}{latest}");
    assert!(!serialized.contains("notes.md"));
    assert!(!serialized.contains("medplum-agent-installer-v1.exe"));
    assert_eq!(all["versions"].as_array().unwrap().len(), 1);
    assert_eq!(latest["version"], "0.1.0");
}

#[tokio::test]
async fn test_catalog_reflects_directory_changes() {
    let server = TestServer::new();
    server.add_installer("1.0.0");

    let (_, before) = server.get_json("/releases/latest.json").await;
    assert_eq!(before["version"], "1.0.0");

    server.add_installer("1.1.0");
    let (_, after) = server.get_json("/releases/latest.json").await;
    assert_eq!(after["version"], "1.1.0");
}

#[tokio::test]
async fn test_unreadable_directory_is_server_error() {
    let server = TestServer::new();
    std::fs::remove_dir(server.dir.path()).unwrap();

    let (status, body) = server.get_json("/releases/all.json").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to read releases" }));

    let (status, _) = server.get_json("/releases/latest.json").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_cors_headers_present() {
    let server = TestServer::new();
    let request = axum::http::Request::builder()
        .uri("/releases/all.json")
        .header("origin", "https://app.example.com")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(server.app.clone(), request)
        .await
        .unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}
