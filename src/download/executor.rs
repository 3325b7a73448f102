//! Staged downloads.
//!
//! A download moves through `Pending → Downloading → Staged → Committed`, or
//! ends in `Failed`. The body is streamed into a temporary file in the staging
//! directory and only moved to its destination once complete, so a failed
//! transfer never leaves a partial file at the destination. Staged files are
//! `NamedTempFile`s and disappear when dropped on any failure path.

use std::fmt;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::store::{FileStore, STAGING_PREFIX, STAGING_SUFFIX};
use crate::directory::FileRef;
use crate::error::BridgeError;
use crate::http::{RequestSpec, request_builder};

/// Lifecycle of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Pending,
    Downloading,
    Staged,
    Committed,
    Failed,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Staged => "staged",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A validated download.
#[derive(Debug, Clone)]
pub struct DownloadSpec {
    /// Source request (GET unless the caller chose otherwise).
    pub request: RequestSpec,
    /// Destination.
    pub file: FileRef,
}

/// Result of a committed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Absolute destination path.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Downloads files into symbolic storage directories.
#[derive(Debug, Clone)]
pub struct DownloadExecutor {
    client: Client,
    files: FileStore,
    staging_dir: PathBuf,
}

impl DownloadExecutor {
    /// Creates an executor that stages files in `staging_dir`.
    #[must_use]
    pub fn new(client: Client, files: FileStore, staging_dir: PathBuf) -> Self {
        Self {
            client,
            files,
            staging_dir,
        }
    }

    /// Downloads `spec.request` into `spec.file`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Network`] / [`BridgeError::Timeout`] /
    ///   [`BridgeError::DownloadStatus`] while downloading
    /// - [`BridgeError::Filesystem`] while staging or committing
    #[instrument(skip(self, spec), fields(url = %spec.request.url, file = %spec.file.relative_path().display()))]
    pub async fn download(&self, spec: &DownloadSpec) -> Result<DownloadedFile, BridgeError> {
        let mut state = DownloadState::Pending;
        let result = self.run(spec, &mut state).await;
        if let Err(error) = &result {
            warn!(from = %state, error = %error, "download failed");
            advance(&mut state, DownloadState::Failed);
        }
        result
    }

    async fn run(
        &self,
        spec: &DownloadSpec,
        state: &mut DownloadState,
    ) -> Result<DownloadedFile, BridgeError> {
        advance(state, DownloadState::Downloading);
        let url = spec.request.url.as_str();
        let response = request_builder(&self.client, &spec.request)
            .send()
            .await
            .map_err(|e| BridgeError::network(url, e))?;
        if !response.status().is_success() {
            return Err(BridgeError::download_status(url, response.status().as_u16()));
        }

        let (staged, bytes) = self.stage(response, url).await?;
        advance(state, DownloadState::Staged);

        let path = self.files.commit(staged, &spec.file).await?;
        advance(state, DownloadState::Committed);

        info!(path = %path.display(), bytes, "download complete");
        Ok(DownloadedFile { path, bytes })
    }

    /// Streams the body into a new staged file, returning it with its size.
    async fn stage(
        &self,
        response: reqwest::Response,
        url: &str,
    ) -> Result<(NamedTempFile, u64), BridgeError> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| BridgeError::filesystem(&self.staging_dir, e))?;
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&self.staging_dir)
            .map_err(|e| BridgeError::filesystem(&self.staging_dir, e))?;
        let handle = staged
            .as_file()
            .try_clone()
            .map_err(|e| BridgeError::filesystem(staged.path(), e))?;

        let bytes = stream_to_file(tokio::fs::File::from_std(handle), response, url, staged.path())
            .await?;
        debug!(staged = %staged.path().display(), bytes, "body staged");
        Ok((staged, bytes))
    }
}

fn advance(state: &mut DownloadState, next: DownloadState) {
    debug!(from = %state, to = %next, "download state");
    *state = next;
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: tokio::fs::File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, BridgeError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| BridgeError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| BridgeError::filesystem(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| BridgeError::filesystem(file_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| BridgeError::filesystem(file_path, e))?;

    Ok(bytes_written)
}
