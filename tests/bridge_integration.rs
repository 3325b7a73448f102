//! Integration tests for bridge calls against a mock HTTP server.

use std::path::Path;
use std::sync::Arc;

use http_bridge::{
    BridgeConfig, Directory, DirectoryResolver, ErrorKind, HttpBridge, RootedDirectories,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{any, body_bytes, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    base: TempDir,
    staging: TempDir,
    bridge: HttpBridge,
}

impl Harness {
    fn new(server_url: Option<&str>) -> Self {
        let base = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let mut config = BridgeConfig::new();
        if let Some(url) = server_url {
            config = config.with_server_url(url).unwrap();
        }
        config.staging_dir = Some(staging.path().to_path_buf());
        let directories = RootedDirectories::under(base.path());
        let bridge = HttpBridge::new(&config, Arc::new(directories)).unwrap();
        Self {
            base,
            staging,
            bridge,
        }
    }

    fn documents(&self) -> std::path::PathBuf {
        self.base.path().join("Documents")
    }

    fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging.path()).unwrap().count() == 0
    }
}

fn write_file(path: &Path, content: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

// ==================== Validation ====================

#[tokio::test]
async fn test_request_without_method_fails_without_network_io() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let failure = harness
        .bridge
        .call("request", &json!({"url": format!("{}/x", mock_server.uri())}))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Validation);
    assert_eq!(failure.message, "Must provide an HTTP Method");
}

#[tokio::test]
async fn test_download_without_file_path_touches_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let failure = harness
        .bridge
        .call("downloadFile", &json!({"url": mock_server.uri()}))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Validation);
    assert!(!harness.documents().exists());
}

// ==================== Requests ====================

#[tokio::test]
async fn test_get_returns_status_headers_and_json_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("page", "2"))
        .and(header("x-token", "t1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "abc")
                .set_body_json(json!({"items": [1, 2, 3]})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let result = harness
        .bridge
        .call(
            "get",
            &json!({
                "url": format!("{}/items", mock_server.uri()),
                "params": {"page": 2},
                "headers": {"X-Token": "t1"}
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["status"], 200);
    assert_eq!(result["headers"]["x-request-id"], "abc");
    assert_eq!(result["body"], json!({"items": [1, 2, 3]}));
    assert!(result["url"].as_str().unwrap().ends_with("/items?page=2"));
}

#[tokio::test]
async fn test_request_posts_json_data() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(body_json(json!({"name": "bridge"})))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let result = harness
        .bridge
        .call(
            "request",
            &json!({
                "url": format!("{}/echo", mock_server.uri()),
                "method": "POST",
                "headers": {"Content-Type": "application/json"},
                "data": {"name": "bridge"}
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["status"], 201);
    assert_eq!(result["body"], "created");
}

#[tokio::test]
async fn test_request_error_status_is_a_successful_call() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let result = harness
        .bridge
        .call("del", &json!({"url": format!("{}/gone", mock_server.uri())}))
        .await
        .unwrap();

    assert_eq!(result["status"], 404);
    assert_eq!(result["body"], "missing");
}

#[tokio::test]
async fn test_arraybuffer_response_is_base64() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8, 1, 2, 255]))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let result = harness
        .bridge
        .call(
            "get",
            &json!({
                "url": format!("{}/bytes", mock_server.uri()),
                "responseType": "arraybuffer"
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["body"], "AAEC/w==");
}

#[tokio::test]
async fn test_unreachable_host_is_network_failure() {
    let harness = Harness::new(None);
    let failure = harness
        .bridge
        .call("get", &json!({"url": "http://127.0.0.1:1/unreachable"}))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Network);
}

// ==================== Downloads ====================

#[tokio::test]
async fn test_download_creates_directories_and_exact_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![42_u8; 200]))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let params = json!({
        "url": format!("{}/file.bin", mock_server.uri()),
        "filePath": "sub/dir/file.bin",
        "fileDirectory": "DOCUMENTS"
    });
    let result = harness.bridge.call("downloadFile", &params).await.unwrap();

    let expected = harness.documents().join("sub/dir/file.bin");
    assert_eq!(result, json!({"path": expected.to_string_lossy()}));
    assert_eq!(std::fs::read(&expected).unwrap(), vec![42_u8; 200]);
    assert!(harness.staging_is_empty());

    // second download replaces the file and leaves no temporary files behind
    harness.bridge.call("downloadFile", &params).await.unwrap();
    assert_eq!(
        std::fs::read_dir(harness.documents().join("sub/dir"))
            .unwrap()
            .count(),
        1
    );
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_download_defaults_to_documents() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    harness
        .bridge
        .call(
            "downloadFile",
            &json!({"url": mock_server.uri(), "filePath": "hello.txt"}),
        )
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(harness.documents().join("hello.txt")).unwrap(),
        "hello"
    );
}

#[tokio::test]
async fn test_download_server_error_leaves_no_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let failure = harness
        .bridge
        .call(
            "downloadFile",
            &json!({
                "url": mock_server.uri(),
                "filePath": "broken.bin",
                "fileDirectory": "CACHE"
            }),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Network);
    assert!(failure.message.contains("500"));
    assert!(!harness.base.path().join("Caches/broken.bin").exists());
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_download_rejects_path_escaping_directory() {
    let harness = Harness::new(None);
    let failure = harness
        .bridge
        .call(
            "downloadFile",
            &json!({"url": "https://example.com/x", "filePath": "../outside.bin"}),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Validation);
}

// ==================== Uploads ====================

#[tokio::test]
async fn test_upload_raw_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_bytes(b"raw upload".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    write_file(&harness.base.path().join("Data/in/raw.txt"), b"raw upload");

    let result = harness
        .bridge
        .call(
            "uploadFile",
            &json!({
                "url": format!("{}/upload", mock_server.uri()),
                "filePath": "in/raw.txt",
                "fileDirectory": "DATA"
            }),
        )
        .await
        .unwrap();

    assert_eq!(result["status"], 200);
    assert_eq!(result["body"], json!({"ok": true}));
}

#[tokio::test]
async fn test_upload_multipart_with_fields() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/form"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    write_file(&harness.documents().join("photo.jpg"), b"JPEGDATA");

    let result = harness
        .bridge
        .call(
            "uploadFile",
            &json!({
                "url": format!("{}/form", mock_server.uri()),
                "filePath": "photo.jpg",
                "name": "picture",
                "data": {"album": "holidays"}
            }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], 204);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let content_type = requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"picture\"; filename=\"photo.jpg\""));
    assert!(body.contains("name=\"album\""));
    assert!(body.contains("holidays"));
    assert!(body.contains("JPEGDATA"));
}

#[tokio::test]
async fn test_upload_missing_file_is_file_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(None);
    let failure = harness
        .bridge
        .call(
            "uploadFile",
            &json!({"url": mock_server.uri(), "filePath": "nope.txt"}),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind, ErrorKind::FileNotFound);
}

// ==================== Cookies ====================

#[tokio::test]
async fn test_cookie_value_with_separators_round_trips() {
    let harness = Harness::new(Some("https://app.example.com"));
    harness
        .bridge
        .call("setCookie", &json!({"key": "a", "value": "b;c"}))
        .await
        .unwrap();

    let got = harness
        .bridge
        .call("getCookie", &json!({"key": "a"}))
        .await
        .unwrap();
    assert_eq!(got["value"], "b;c");
    assert_eq!(got["found"], true);
}

#[tokio::test]
async fn test_delete_missing_cookie_succeeds() {
    let harness = Harness::new(Some("https://app.example.com"));
    let result = harness
        .bridge
        .call("deleteCookie", &json!({"key": "never-set"}))
        .await
        .unwrap();
    assert_eq!(result, json!({}));
}

#[tokio::test]
async fn test_cookie_calls_fail_without_server_url() {
    let harness = Harness::new(None);
    let failure = harness
        .bridge
        .call("getCookies", &Value::Null)
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ErrorKind::Configuration);
}

#[tokio::test]
async fn test_jar_cookies_are_sent_and_received_by_requests() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("cookie", "session=abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "token=xyz; Path=/; HttpOnly")
                .set_body_string("hi"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(Some(&mock_server.uri()));
    harness
        .bridge
        .call("setCookie", &json!({"key": "session", "value": "abc"}))
        .await
        .unwrap();

    let result = harness
        .bridge
        .call("get", &json!({"url": format!("{}/me", mock_server.uri())}))
        .await
        .unwrap();
    assert_eq!(result["status"], 200);

    let token = harness
        .bridge
        .call("getCookie", &json!({"key": "token"}))
        .await
        .unwrap();
    assert_eq!(token["value"], "xyz");
}

#[tokio::test]
async fn test_concurrent_cookie_writes_are_all_kept() {
    let harness = Harness::new(Some("https://app.example.com"));
    let bridge = Arc::new(harness.bridge);

    let mut handles = Vec::new();
    for i in 0..16 {
        let bridge = Arc::clone(&bridge);
        handles.push(tokio::spawn(async move {
            bridge
                .call(
                    "setCookie",
                    &json!({"key": format!("k{i}"), "value": format!("v{i}")}),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let all = bridge.call("getCookies", &json!({})).await.unwrap();
    assert_eq!(all["cookies"].as_array().unwrap().len(), 16);
}

#[test]
fn test_directory_tags_map_to_folders() {
    let base = TempDir::new().unwrap();
    let directories = RootedDirectories::under(base.path());
    assert_eq!(
        directories.resolve(Directory::ExternalStorage),
        Some(base.path().join("ExternalStorage"))
    );
}
