//! Bridge configuration.
//!
//! The server origin is part of an explicit [`BridgeConfig`] handed to the
//! bridge at construction time. It is read once and never changes afterwards.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::BridgeError;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default number of redirects followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Name of the server origin setting, reported when it is missing.
pub const SERVER_URL_SETTING: &str = "server.url";

/// Settings for an [`HttpBridge`](crate::HttpBridge).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    server_url: Option<Url>,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout applied when a call gives no `readTimeout`.
    pub read_timeout: Duration,
    /// Redirects followed per request; `0` disables redirects.
    pub max_redirects: usize,
    /// User-Agent sent on every request unless a call overrides it.
    pub user_agent: String,
    /// Directory for staged downloads. Defaults to the system temp directory.
    pub staging_dir: Option<PathBuf>,
    /// JSON file backing the cookie store. In-memory when unset.
    pub cookie_store_path: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: default_user_agent(),
            staging_dir: None,
            cookie_store_path: None,
        }
    }
}

impl BridgeConfig {
    /// Creates a configuration with defaults and no server origin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server origin from a URL string.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `url` is not an absolute http(s) URL
    /// with a host.
    pub fn with_server_url(mut self, url: &str) -> Result<Self, BridgeError> {
        let parsed = Url::parse(url)
            .map_err(|e| BridgeError::invalid("server.url", format!("Invalid server URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(BridgeError::invalid(
                "server.url",
                format!("Server URL must be an http(s) URL with a host: {url}"),
            ));
        }
        self.server_url = Some(parsed);
        Ok(self)
    }

    /// Returns the configured server URL.
    #[must_use]
    pub fn server_url(&self) -> Option<&Url> {
        self.server_url.as_ref()
    }

    /// Returns the staging directory for downloads.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Default User-Agent (identifies the bridge and its version).
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("http-bridge/{version}")
}
