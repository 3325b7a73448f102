//! File uploads from symbolic storage directories.

use std::io;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tracing::{debug, info, instrument};

use super::request::{RequestSpec, request_builder};
use super::response::HttpResponse;
use crate::directory::FileRef;
use crate::download::FileStore;
use crate::error::BridgeError;

/// Default multipart field name for the uploaded file.
pub const DEFAULT_UPLOAD_FIELD: &str = "file";

/// A validated upload.
#[derive(Debug, Clone)]
pub struct UploadSpec {
    /// Target request; its body is replaced by the file.
    pub request: RequestSpec,
    /// Source file.
    pub file: FileRef,
    /// Multipart layout, or `None` to send the file as the raw body.
    pub multipart: Option<MultipartUpload>,
}

/// Multipart layout for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    /// Field name carrying the file part.
    pub field_name: String,
    /// Extra text fields sent before the file part.
    pub fields: Vec<(String, String)>,
}

/// Streams local files to a URL.
#[derive(Debug, Clone)]
pub struct UploadExecutor {
    client: Client,
    files: FileStore,
}

impl UploadExecutor {
    /// Creates an upload executor.
    #[must_use]
    pub fn new(client: Client, files: FileStore) -> Self {
        Self { client, files }
    }

    /// Uploads the referenced file and returns the server response.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::FileNotFound`] when the source is missing, unreadable
    ///   or not a regular file
    /// - [`BridgeError::Network`] / [`BridgeError::Timeout`] on transport failure
    #[instrument(skip(self, spec), fields(method = %spec.request.method, url = %spec.request.url))]
    pub async fn upload(&self, spec: &UploadSpec) -> Result<HttpResponse, BridgeError> {
        let path = self.files.resolve(&spec.file)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| BridgeError::file_not_found(&path, e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| BridgeError::file_not_found(&path, e))?;
        if !metadata.is_file() {
            return Err(BridgeError::file_not_found(
                &path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let length = metadata.len();
        debug!(path = %path.display(), bytes = length, "streaming upload source");

        let body = Body::from(file);
        let builder = request_builder(&self.client, &spec.request);
        let builder = match &spec.multipart {
            Some(multipart) => {
                let file_name = path
                    .file_name()
                    .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
                let part = Part::stream_with_length(body, length).file_name(file_name);
                let form = multipart
                    .fields
                    .iter()
                    .fold(Form::new(), |form, (name, value)| {
                        form.text(name.clone(), value.clone())
                    })
                    .part(multipart.field_name.clone(), part);
                builder.multipart(form)
            }
            None => {
                let builder = if spec.request.has_header(&CONTENT_TYPE) {
                    builder
                } else {
                    builder.header(CONTENT_TYPE, "application/octet-stream")
                };
                builder.header(CONTENT_LENGTH, length).body(body)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| BridgeError::network(spec.request.url.as_str(), e))?;
        let response = HttpResponse::read(response, spec.request.response_type).await?;
        info!(status = response.status, bytes = length, "upload complete");
        Ok(response)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::directory::{Directory, RootedDirectories};
    use crate::error::ErrorKind;
    use reqwest::Method;
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor(root: &TempDir) -> UploadExecutor {
        let resolver = RootedDirectories::new().with(Directory::Documents, root.path());
        UploadExecutor::new(Client::new(), FileStore::new(Arc::new(resolver)))
    }

    fn upload_spec(url: &str, file: &str, multipart: Option<MultipartUpload>) -> UploadSpec {
        UploadSpec {
            request: RequestSpec::new(Method::POST, Url::parse(url).unwrap()),
            file: FileRef::new(Directory::Documents, file).unwrap(),
            multipart,
        }
    }

    #[tokio::test]
    async fn test_upload_raw_body_streams_file_bytes() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("content-type", "application/octet-stream"))
            .and(body_bytes(b"raw file bytes".to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .mount(&mock_server)
            .await;

        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("notes.txt"), b"raw file bytes").unwrap();

        let spec = upload_spec(&format!("{}/upload", mock_server.uri()), "notes.txt", None);
        let response = executor(&root).upload(&spec).await.unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_upload_multipart_includes_fields_and_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/form"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("photos")).unwrap();
        std::fs::write(root.path().join("photos/cat.jpg"), b"JPEGDATA").unwrap();

        let spec = upload_spec(
            &format!("{}/form", mock_server.uri()),
            "photos/cat.jpg",
            Some(MultipartUpload {
                field_name: "avatar".to_string(),
                fields: vec![("album".to_string(), "pets".to_string())],
            }),
        );
        let response = executor(&root).upload(&spec).await.unwrap();
        assert_eq!(response.status, 200);

        let requests = mock_server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).into_owned();
        assert!(body.contains(r#"name="album""#), "missing field in: {body}");
        assert!(body.contains("pets"));
        assert!(body.contains(r#"name="avatar"; filename="cat.jpg""#));
        assert!(body.contains("JPEGDATA"));
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_file_not_found_without_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let root = TempDir::new().unwrap();
        let spec = upload_spec(&format!("{}/upload", mock_server.uri()), "absent.bin", None);
        let err = executor(&root).upload(&spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[tokio::test]
    async fn test_upload_directory_source_is_file_not_found() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("folder")).unwrap();
        let spec = upload_spec("http://127.0.0.1:9/upload", "folder", None);
        let err = executor(&root).upload(&spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }
}
