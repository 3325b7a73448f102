//! HTTP Bridge Library
//!
//! Native HTTP, file transfer and cookie operations for script callers.
//! A call arrives as a method name plus a JSON parameter object and resolves
//! to either a JSON result or exactly one structured failure.
//!
//! # Architecture
//!
//! - [`params`] - Parameter validation, run before any I/O
//! - [`http`] - Shared client, generic requests and file uploads
//! - [`download`] - Staged downloads and atomic placement
//! - [`cookies`] - Origin-scoped cookie jar shared with the HTTP client
//! - [`directory`] - Symbolic storage directories
//! - [`bridge`] - The facade dispatching calls by method name

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod config;
pub mod cookies;
pub mod directory;
pub mod download;
pub mod error;
pub mod http;
pub mod params;

// Re-export commonly used types
pub use bridge::{HttpBridge, METHODS};
pub use config::BridgeConfig;
pub use cookies::{CookieEntry, CookieJar, SharedCookies};
pub use directory::{Directory, DirectoryResolver, FileRef, RootedDirectories};
pub use error::{BridgeError, CallFailure, ErrorKind};
