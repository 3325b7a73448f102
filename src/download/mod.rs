//! File downloads into symbolic storage directories.
//!
//! # Features
//!
//! - Streaming downloads into a staged temporary file
//! - Atomic placement (rename) at the destination, replacing existing files
//! - Intermediate directories created on demand
//! - No partial or temporary files left behind on failure
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use http_bridge::directory::{Directory, FileRef, RootedDirectories};
//! use http_bridge::download::{DownloadExecutor, DownloadSpec, FileStore};
//! use http_bridge::http::RequestSpec;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = RootedDirectories::under(std::path::Path::new("/srv/app"));
//! let executor = DownloadExecutor::new(
//!     reqwest::Client::new(),
//!     FileStore::new(Arc::new(resolver)),
//!     std::env::temp_dir(),
//! );
//! let spec = DownloadSpec {
//!     request: RequestSpec::new(reqwest::Method::GET, "https://example.com/a.pdf".parse()?),
//!     file: FileRef::new(Directory::Documents, "papers/a.pdf")?,
//! };
//! let downloaded = executor.download(&spec).await?;
//! println!("Downloaded: {}", downloaded.path.display());
//! # Ok(())
//! # }
//! ```

mod executor;
mod store;

pub use executor::{DownloadExecutor, DownloadSpec, DownloadState, DownloadedFile};
pub use store::FileStore;
