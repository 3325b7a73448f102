//! Shared reqwest client construction.

use std::sync::Arc;

use reqwest::Client;
use reqwest::redirect::Policy;
use tracing::{debug, instrument};

use crate::config::BridgeConfig;
use crate::cookies::SharedCookies;
use crate::error::BridgeError;

/// Builds the client shared by requests, uploads and downloads.
///
/// `cookies` is installed as the cookie provider so native calls send and
/// receive the same cookies that the jar exposes to scripts.
///
/// # Errors
///
/// Returns [`BridgeError::Unknown`] if the TLS backend cannot be initialized.
#[instrument(level = "debug", skip(config, cookies))]
pub fn build_client(config: &BridgeConfig, cookies: SharedCookies) -> Result<Client, BridgeError> {
    let redirect = if config.max_redirects == 0 {
        Policy::none()
    } else {
        Policy::limited(config.max_redirects)
    };
    debug!(
        connect_timeout = ?config.connect_timeout,
        read_timeout = ?config.read_timeout,
        max_redirects = config.max_redirects,
        "building HTTP client"
    );

    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.read_timeout)
        .redirect(redirect)
        .gzip(true)
        .user_agent(config.user_agent.clone())
        .cookie_provider(Arc::new(cookies))
        .build()
        .map_err(|e| BridgeError::unknown(format!("failed to build HTTP client: {e}")))
}
