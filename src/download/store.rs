//! Destination resolution and atomic placement of downloaded files.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{NamedTempFile, PersistError};
use tracing::{debug, instrument};

use crate::directory::{Directory, DirectoryResolver, FileRef};
use crate::error::BridgeError;

/// Prefix for staged and intermediate files.
pub(crate) const STAGING_PREFIX: &str = ".http-bridge-";
/// Suffix for staged and intermediate files.
pub(crate) const STAGING_SUFFIX: &str = ".part";

/// Maps [`FileRef`]s to absolute paths and commits staged files.
#[derive(Clone)]
pub struct FileStore {
    resolver: Arc<dyn DirectoryResolver>,
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl FileStore {
    /// Creates a store over `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn DirectoryResolver>) -> Self {
        Self { resolver }
    }

    /// Root of `directory`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the resolver does not provide it.
    pub fn root(&self, directory: Directory) -> Result<PathBuf, BridgeError> {
        self.resolver.resolve(directory).ok_or_else(|| {
            BridgeError::invalid(
                "fileDirectory",
                format!("Directory {directory} is not available"),
            )
        })
    }

    /// Absolute path of `file`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the directory is unavailable, or a
    /// filesystem error when the current directory is needed and unreadable.
    pub fn resolve(&self, file: &FileRef) -> Result<PathBuf, BridgeError> {
        let path = file.under(&self.root(file.directory())?);
        std::path::absolute(&path).map_err(|e| BridgeError::filesystem(path, e))
    }

    /// Moves `staged` to the destination of `file`, creating missing parent
    /// directories. An existing file at the destination is replaced.
    ///
    /// On failure the staged file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Filesystem`] if directories cannot be created or
    /// the move fails.
    #[instrument(level = "debug", skip(self, staged), fields(staged = %staged.path().display()))]
    pub async fn commit(&self, staged: NamedTempFile, file: &FileRef) -> Result<PathBuf, BridgeError> {
        let destination = self.resolve(file)?;
        let parent = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| destination.clone());

        // create_dir_all tolerates a concurrent creator of the same directory.
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| BridgeError::filesystem(&parent, e))?;

        let target = destination.clone();
        tokio::task::spawn_blocking(move || move_into_place(staged, &target))
            .await
            .map_err(|e| BridgeError::unknown(format!("file commit task failed: {e}")))??;

        debug!(path = %destination.display(), "file committed");
        Ok(destination)
    }
}

fn move_into_place(staged: NamedTempFile, destination: &Path) -> Result<(), BridgeError> {
    match staged.persist(destination) {
        Ok(_) => Ok(()),
        Err(PersistError { error, file }) if error.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                path = %destination.display(),
                "staging area is on another filesystem, copying beside destination"
            );
            copy_then_rename(file, destination)
        }
        Err(PersistError { error, .. }) => Err(BridgeError::filesystem(destination, error)),
    }
}

/// Copies `staged` next to `destination`, then renames it into place so the
/// destination never holds a partial file.
fn copy_then_rename(staged: NamedTempFile, destination: &Path) -> Result<(), BridgeError> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let mut beside = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(parent)
        .map_err(|e| BridgeError::filesystem(parent, e))?;
    let mut source = staged
        .reopen()
        .map_err(|e| BridgeError::filesystem(staged.path(), e))?;
    io::copy(&mut source, beside.as_file_mut())
        .and_then(|_| beside.as_file().sync_all())
        .map_err(|e| BridgeError::filesystem(beside.path(), e))?;
    beside
        .persist(destination)
        .map_err(|e| BridgeError::filesystem(destination, e.error))?;
    Ok(())
}
