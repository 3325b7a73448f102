//! Error types for bridge operations.
//!
//! Every component reports failures as [`BridgeError`]. Only the bridge facade
//! converts them into the caller-visible [`CallFailure`] shape, so each failed
//! call produces exactly one structured failure with a stable error kind.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::cookies::CookieStoreError;

/// Caller-visible failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Missing or malformed input, detected before any I/O.
    Validation,
    /// No server origin configured for a cookie operation.
    Configuration,
    /// Transport or connection failure.
    Network,
    /// Upload source missing or unreadable.
    FileNotFound,
    /// Directory creation or move failure while placing a download.
    Filesystem,
    /// Anything not covered above.
    Unknown,
}

impl ErrorKind {
    /// Returns the stable code string for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Configuration => "CONFIGURATION",
            Self::Network => "NETWORK",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::Filesystem => "FILESYSTEM",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by bridge components.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A call parameter is missing or malformed.
    #[error("{message}")]
    Validation {
        /// Name of the offending parameter, when one applies.
        field: Option<&'static str>,
        /// Human-readable description.
        message: String,
    },

    /// A required setting is absent from the bridge configuration.
    #[error("Invalid URL. Check that \"{setting}\" is set correctly in the bridge configuration")]
    Configuration {
        /// The exact missing setting.
        setting: &'static str,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Download target answered with a non-success status.
    #[error("HTTP {status} downloading {url}")]
    DownloadStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Upload source does not exist or cannot be read.
    #[error("unable to read upload file {path}: {source}")]
    FileNotFound {
        /// Resolved source path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// File system error while staging or placing a file.
    #[error("IO error at {path}: {source}")]
    Filesystem {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Cookie store persistence failure.
    #[error(transparent)]
    CookieStore(#[from] CookieStoreError),

    /// Catch-all for unmapped faults.
    #[error("{message}")]
    Unknown {
        /// Description of the fault.
        message: String,
    },
}

impl BridgeError {
    /// Creates a validation error tied to a parameter name.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field),
            message: message.into(),
        }
    }

    /// Creates a validation error that is not tied to one parameter.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a configuration error naming the missing setting.
    #[must_use]
    pub fn missing_setting(setting: &'static str) -> Self {
        Self::Configuration { setting }
    }

    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a download status error.
    pub fn download_status(url: impl Into<String>, status: u16) -> Self {
        Self::DownloadStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a file-not-found error for an upload source.
    pub fn file_not_found(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileNotFound {
            path: path.into(),
            source,
        }
    }

    /// Creates a filesystem error.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Creates a catch-all error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Returns the caller-visible category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Network { .. } | Self::Timeout { .. } | Self::DownloadStatus { .. } => {
                ErrorKind::Network
            }
            Self::FileNotFound { .. } => ErrorKind::FileNotFound,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::CookieStore(error) => match error {
                CookieStoreError::Io { .. } => ErrorKind::Filesystem,
                CookieStoreError::Serialize(_) | CookieStoreError::Corrupt { .. } => {
                    ErrorKind::Unknown
                }
            },
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }
}

/// Structured failure returned to the script side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallFailure {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable message including the underlying cause.
    pub message: String,
}

impl From<BridgeError> for CallFailure {
    fn from(error: BridgeError) -> Self {
        let kind = error.kind();
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        // reqwest errors keep the useful detail (DNS, TLS, reset) further down the chain
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        Self { kind, message }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
