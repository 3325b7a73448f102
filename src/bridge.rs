//! The script-facing facade.
//!
//! [`HttpBridge::call`] takes a method name and a JSON parameter object,
//! validates it, runs the matching executor and maps the outcome to either a
//! JSON success payload or a single [`CallFailure`].

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::config::{BridgeConfig, SERVER_URL_SETTING};
use crate::cookies::{CookieJar, CookieStore, FileCookieStore, MemoryCookieStore, SharedCookies};
use crate::directory::DirectoryResolver;
use crate::download::{DownloadExecutor, FileStore};
use crate::error::{BridgeError, CallFailure};
use crate::http::{RequestExecutor, UploadExecutor, build_client};
use crate::params::{self, CallParams};

/// Method names accepted by [`HttpBridge::call`].
pub const METHODS: [&str; 13] = [
    "request",
    "get",
    "post",
    "put",
    "patch",
    "del",
    "downloadFile",
    "uploadFile",
    "setCookie",
    "getCookie",
    "getCookies",
    "deleteCookie",
    "clearCookies",
];

/// Native HTTP bridge.
///
/// Cheap to share behind an `Arc`; every call is independent and calls may
/// run concurrently.
#[derive(Debug)]
pub struct HttpBridge {
    files: FileStore,
    requests: RequestExecutor,
    uploads: UploadExecutor,
    downloads: DownloadExecutor,
    cookies: SharedCookies,
    jar: Option<CookieJar>,
}

impl HttpBridge {
    /// Creates a bridge with the cookie store described by `config`: a JSON
    /// file when `cookie_store_path` is set, memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie file cannot be read or the HTTP client
    /// cannot be built.
    pub fn new(
        config: &BridgeConfig,
        directories: Arc<dyn DirectoryResolver>,
    ) -> Result<Self, BridgeError> {
        let store: Box<dyn CookieStore> = match &config.cookie_store_path {
            Some(path) => Box::new(FileCookieStore::open(path)?),
            None => Box::new(MemoryCookieStore::new()),
        };
        Self::with_cookies(config, directories, SharedCookies::from_boxed(store))
    }

    /// Creates a bridge over an existing cookie handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_cookies(
        config: &BridgeConfig,
        directories: Arc<dyn DirectoryResolver>,
        cookies: SharedCookies,
    ) -> Result<Self, BridgeError> {
        let client = build_client(config, cookies.clone())?;
        let files = FileStore::new(directories);
        let jar = config.server_url().map(|url| cookies.jar(url));
        debug!(
            origin = jar.as_ref().map_or("<unset>", CookieJar::origin),
            "bridge ready"
        );

        Ok(Self {
            requests: RequestExecutor::new(client.clone()),
            uploads: UploadExecutor::new(client.clone(), files.clone()),
            downloads: DownloadExecutor::new(client, files.clone(), config.staging_dir()),
            files,
            cookies,
            jar,
        })
    }

    /// The cookie handle shared with the HTTP client.
    #[must_use]
    pub fn cookies(&self) -> &SharedCookies {
        &self.cookies
    }

    /// The jar of the configured server origin, if one is configured.
    #[must_use]
    pub fn cookie_jar(&self) -> Option<&CookieJar> {
        self.jar.as_ref()
    }

    /// Runs one script call.
    ///
    /// # Errors
    ///
    /// Returns the structured failure of the call. Validation failures are
    /// reported before any network or filesystem I/O.
    #[instrument(skip(self, params), fields(method = %method))]
    pub async fn call(&self, method: &str, params: &Value) -> Result<Value, CallFailure> {
        match self.dispatch(method, params).await {
            Ok(result) => {
                debug!("call succeeded");
                Ok(result)
            }
            Err(error) => {
                warn!(kind = %error.kind(), error = %error, "call failed");
                Err(error.into())
            }
        }
    }

    async fn dispatch(&self, method: &str, params: &Value) -> Result<Value, BridgeError> {
        let verb = match method {
            "get" => Some(Method::GET),
            "post" => Some(Method::POST),
            "put" => Some(Method::PUT),
            "patch" => Some(Method::PATCH),
            "del" => Some(Method::DELETE),
            _ => None,
        };
        if !METHODS.contains(&method) {
            return Err(BridgeError::validation(format!("Unknown method '{method}'")));
        }
        let params = CallParams::new(params)?;

        match method {
            "downloadFile" => self.download_file(&params).await,
            "uploadFile" => self.upload_file(&params).await,
            "setCookie" => self.set_cookie(&params).await,
            "getCookie" => self.get_cookie(&params).await,
            "getCookies" => self.get_cookies().await,
            "deleteCookie" => self.delete_cookie(&params).await,
            "clearCookies" => self.clear_cookies().await,
            _ => self.request(&params, verb).await,
        }
    }

    async fn request(
        &self,
        params: &CallParams<'_>,
        verb: Option<Method>,
    ) -> Result<Value, BridgeError> {
        let spec = params::request_spec(params, verb)?;
        let response = self.requests.execute(&spec).await?;
        to_json(&response)
    }

    async fn download_file(&self, params: &CallParams<'_>) -> Result<Value, BridgeError> {
        let spec = params::download_spec(params, &self.files)?;
        let downloaded = self.downloads.download(&spec).await?;
        Ok(json!({ "path": downloaded.path.to_string_lossy() }))
    }

    async fn upload_file(&self, params: &CallParams<'_>) -> Result<Value, BridgeError> {
        let spec = params::upload_spec(params, &self.files)?;
        let response = self.uploads.upload(&spec).await?;
        to_json(&response)
    }

    fn jar(&self) -> Result<&CookieJar, BridgeError> {
        self.jar
            .as_ref()
            .ok_or_else(|| BridgeError::missing_setting(SERVER_URL_SETTING))
    }

    /// Runs `op` against the jar off the async workers: a file-backed store
    /// rewrites its file while holding the store lock.
    async fn with_jar<T, F>(&self, op: F) -> Result<T, BridgeError>
    where
        T: Send + 'static,
        F: FnOnce(&CookieJar) -> Result<T, BridgeError> + Send + 'static,
    {
        let jar = self.jar()?.clone();
        tokio::task::spawn_blocking(move || op(&jar))
            .await
            .map_err(|e| BridgeError::unknown(format!("cookie task failed: {e}")))?
    }

    async fn set_cookie(&self, params: &CallParams<'_>) -> Result<Value, BridgeError> {
        let entry = params::cookie_entry(params)?;
        self.with_jar(move |jar| Ok(jar.set_cookie(&entry.name, &entry.value)?))
            .await?;
        Ok(json!({}))
    }

    async fn get_cookie(&self, params: &CallParams<'_>) -> Result<Value, BridgeError> {
        let key = params::cookie_key(params)?.to_string();
        let lookup = key.clone();
        let found = self.with_jar(move |jar| Ok(jar.get_cookie(&lookup))).await?;
        Ok(json!({
            "key": key,
            "value": found.as_ref().map_or("", |entry| entry.value.as_str()),
            "found": found.is_some(),
        }))
    }

    async fn get_cookies(&self) -> Result<Value, BridgeError> {
        let cookies = self.with_jar(|jar| Ok(jar.get_cookies())).await?;
        Ok(json!({ "cookies": to_json(&cookies)? }))
    }

    async fn delete_cookie(&self, params: &CallParams<'_>) -> Result<Value, BridgeError> {
        let key = params::cookie_key(params)?.to_string();
        self.with_jar(move |jar| Ok(jar.delete_cookie(&key)?)).await?;
        Ok(json!({}))
    }

    async fn clear_cookies(&self) -> Result<Value, BridgeError> {
        self.with_jar(|jar| Ok(jar.clear_cookies()?)).await?;
        Ok(json!({}))
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, BridgeError> {
    serde_json::to_value(value)
        .map_err(|e| BridgeError::unknown(format!("failed to encode result: {e}")))
}
