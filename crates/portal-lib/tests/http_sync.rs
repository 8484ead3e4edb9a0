//! End-to-end tests of the sync client over HTTP
//!
//! Runs `HttpTransport` against a wiremock server to check request
//! de-duplication, binary error decoding, partial list failures and
//! multipart uploads on the wire.

use portal_lib::{Project, SyncClient, SyncError, User};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn project(id: i64, title: &str) -> serde_json::Value {
    json!({
        "data": {"id": id, "title": title, "series": 2018, "part": 1},
        "links": {"self": format!("/api/projects/{}", id), "cogs_marker": null}
    })
}

fn client_for(server: &MockServer, download_dir: &std::path::Path) -> SyncClient {
    SyncClient::builder()
        .api_url(server.uri())
        .request_timeout(Duration::from_secs(5))
        .download_dir(download_dir)
        .build()
        .expect("client should build")
}

async fn mount_project(server: &MockServer, id: i64, title: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/projects/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(project(id, title)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_identical_reads_hit_server_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(project(1, "Shared"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server, dir.path());

    let (a, b, c) = tokio::join!(
        client.fetch_one::<Project>(1),
        client.fetch_one::<Project>(1),
        client.fetch_one::<Project>(1),
    );

    assert_eq!(a.unwrap().data.title, "Shared");
    assert_eq!(b.unwrap(), c.unwrap());
    assert_eq!(client.store().pending::<Project>(), 0);
}

#[tokio::test]
async fn test_list_with_failing_item_keeps_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/series/2018/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "links": {"projects": ["/api/projects/1", "/api/projects/2"]}
        })))
        .mount(&server)
        .await;
    mount_project(&server, 1, "Kept").await;
    Mock::given(method("GET"))
        .and(path("/api/projects/2"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"status_message": "Database error"})),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server, dir.path());

    let outcome = client.fetch_series_projects(2018, 1).await.unwrap();

    assert_eq!(outcome.received, vec![1]);
    assert_eq!(outcome.failed, vec!["/api/projects/2".to_string()]);
    assert_eq!(client.store().ids::<Project>(), vec![1]);
    assert_eq!(client.store().pending::<Project>(), 0);
}

#[tokio::test]
async fn test_download_of_missing_file() {
    let server = MockServer::start().await;
    mount_project(&server, 3, "Atlas").await;
    Mock::given(method("GET"))
        .and(path("/api/projects/3/file"))
        .respond_with(
            ResponseTemplate::new(404).set_body_bytes(b"{\"status_message\":\"No file\"}".to_vec()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server, dir.path());

    let err = client.download_project(3).await.unwrap_err();

    assert_eq!(err, SyncError::NotUploaded);
    assert_eq!(err.status_message(), "Project not yet uploaded");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_download_error_body_is_decoded() {
    let server = MockServer::start().await;
    mount_project(&server, 3, "Atlas").await;
    Mock::given(method("GET"))
        .and(path("/api/projects/3/file"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(b"{\"status_message\":\"Marking has not started\"}".to_vec()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server, dir.path());

    let err = client.download_project(3).await.unwrap_err();

    assert_eq!(err.status_message(), "Marking has not started");
}

#[tokio::test]
async fn test_download_saves_file() {
    let server = MockServer::start().await;
    mount_project(&server, 3, "Atlas").await;
    Mock::given(method("GET"))
        .and(path("/api/projects/3/file"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"atlas.docx\"")
                .set_body_bytes(b"PK\x03\x04".to_vec()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server, dir.path());

    let message = client.download_project(3).await.unwrap();

    let saved = dir.path().join("2018_1_Atlas.docx");
    assert_eq!(message, format!("Saved to {}", saved.display()));
    assert_eq!(std::fs::read(saved).unwrap(), b"PK\x03\x04");
}

#[tokio::test]
async fn test_upload_sends_multipart_file() {
    let server = MockServer::start().await;
    mount_project(&server, 42, "Cell atlas").await;
    Mock::given(method("PUT"))
        .and(path("/api/projects/42/file"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status_message": "File uploaded"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server, dir.path());
    client.fetch_one::<Project>(42).await.unwrap();

    let message = client
        .upload_project(42, "report.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();

    assert_eq!(message, "File uploaded");
    assert!(client.store().get::<Project>(42).unwrap().data.student_uploaded);

    let requests = server.received_requests().await.unwrap();
    let upload = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("upload request recorded");
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"report.pdf\""));
    assert!(body.contains("%PDF-1.7"));
}

#[tokio::test]
async fn test_mutation_forces_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": 5, "name": "Grace"}
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/users/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": 5, "name": "Grace H."}
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client_for(&server, dir.path());

    client.fetch_me().await.unwrap();
    client.fetch_me().await.unwrap();
    client
        .edit::<User>(5, &json!({"name": "Grace H."}), Default::default())
        .await
        .unwrap();
    client.fetch_me().await.unwrap();

    assert_eq!(client.logged_in_user().unwrap().data.name, "Grace");
}
