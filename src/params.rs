//! Call parameter validation.
//!
//! Turns the untyped parameter object of a script call into typed specs.
//! Rules run in a fixed order and stop at the first failure:
//!
//! 1. required string fields are present and non-empty
//! 2. the URL parses as an absolute http(s) URL
//! 3. optional fields have the right shape
//!
//! Nothing here performs network or filesystem I/O.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use url::Url;

use crate::cookies::{CookieEntry, is_valid_name};
use crate::directory::{Directory, FileRef};
use crate::download::{DownloadSpec, FileStore};
use crate::error::BridgeError;
use crate::http::{
    DEFAULT_UPLOAD_FIELD, MultipartUpload, RequestBody, RequestSpec, ResponseType, UploadSpec,
    is_json_content_type,
};

/// Directory used when a call gives no `fileDirectory`.
pub const DEFAULT_DIRECTORY: Directory = Directory::Documents;

/// HTTP verbs accepted in `method`.
pub const SUPPORTED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

static EMPTY: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

/// Read-only view of a call's parameter object.
#[derive(Debug, Clone, Copy)]
pub struct CallParams<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> CallParams<'a> {
    /// Wraps a parameter value. `null` is treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns a validation error for any other non-object value.
    pub fn new(value: &'a Value) -> Result<Self, BridgeError> {
        match value {
            Value::Object(map) => Ok(Self { map }),
            Value::Null => Ok(Self { map: &EMPTY }),
            _ => Err(BridgeError::validation("Call parameters must be an object")),
        }
    }

    /// Field value; `null` counts as absent.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    /// A required, non-empty string.
    fn required_str(&self, field: &'static str, missing: &str) -> Result<&'a str, BridgeError> {
        match self.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            Some(Value::String(_)) | None => Err(BridgeError::invalid(field, missing)),
            Some(_) => Err(BridgeError::invalid(field, format!("{field} must be a string"))),
        }
    }

    /// A required string that may be empty.
    fn present_str(&self, field: &'static str, missing: &str) -> Result<&'a str, BridgeError> {
        match self.get(field) {
            Some(Value::String(s)) => Ok(s),
            None => Err(BridgeError::invalid(field, missing)),
            Some(_) => Err(BridgeError::invalid(field, format!("{field} must be a string"))),
        }
    }

    fn optional_str(&self, field: &'static str) -> Result<Option<&'a str>, BridgeError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(BridgeError::invalid(field, format!("{field} must be a string"))),
        }
    }

    fn optional_object(
        &self,
        field: &'static str,
    ) -> Result<Option<&'a Map<String, Value>>, BridgeError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(BridgeError::invalid(field, format!("{field} must be an object"))),
        }
    }
}

/// Validates a generic request. `fixed_method` is used by the verb
/// shorthands (`get`, `post`, ...) and makes `method` optional.
///
/// # Errors
///
/// Returns a validation error naming the first offending field.
pub fn request_spec(
    params: &CallParams<'_>,
    fixed_method: Option<Method>,
) -> Result<RequestSpec, BridgeError> {
    let url = params.required_str("url", "Must provide a URL")?;
    let method = match fixed_method {
        Some(method) => method,
        None => {
            let raw = params.required_str("method", "Must provide an HTTP Method")?;
            parse_method(raw)?
        }
    };
    let mut spec = base_request(params, url, method)?;
    spec.body = request_body(params, &mut spec)?;
    Ok(spec)
}

/// Validates a download.
///
/// # Errors
///
/// Returns a validation error naming the first offending field.
pub fn download_spec(params: &CallParams<'_>, files: &FileStore) -> Result<DownloadSpec, BridgeError> {
    let url = params.required_str("url", "Must provide a URL")?;
    let file_path = params.required_str(
        "filePath",
        "Must provide a file path to download the file to",
    )?;
    let request = base_request(params, url, optional_method(params, Method::GET)?)?;
    let file = file_ref(params, file_path, files)?;
    Ok(DownloadSpec { request, file })
}

/// Validates an upload.
///
/// The file is sent as a multipart part when `name` or `data` is given and as
/// the raw body otherwise.
///
/// # Errors
///
/// Returns a validation error naming the first offending field.
pub fn upload_spec(params: &CallParams<'_>, files: &FileStore) -> Result<UploadSpec, BridgeError> {
    let url = params.required_str("url", "Must provide a URL")?;
    let file_path = params.required_str("filePath", "Must provide a file path to upload")?;
    let mut request = base_request(params, url, optional_method(params, Method::POST)?)?;
    let file = file_ref(params, file_path, files)?;

    let field_name = params.optional_str("name")?;
    let fields = params
        .optional_object("data")?
        .map(|data| string_pairs("data", data))
        .transpose()?;
    let multipart = if field_name.is_some() || fields.is_some() {
        // reqwest writes its own multipart Content-Type with the boundary
        request.headers.retain(|(name, _)| *name != CONTENT_TYPE);
        Some(MultipartUpload {
            field_name: field_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(DEFAULT_UPLOAD_FIELD)
                .to_string(),
            fields: fields.unwrap_or_default(),
        })
    } else {
        None
    };

    Ok(UploadSpec {
        request,
        file,
        multipart,
    })
}

/// Validates the `key` of a cookie call.
///
/// # Errors
///
/// Returns a validation error when `key` is missing, empty, or not a cookie
/// name token (separators such as `=`, `;` or whitespace, control or
/// non-ASCII characters).
pub fn cookie_key<'a>(params: &CallParams<'a>) -> Result<&'a str, BridgeError> {
    let key = params.required_str("key", "Must provide key")?;
    if !is_valid_name(key) {
        return Err(BridgeError::invalid(
            "key",
            format!("Invalid cookie name {key:?}"),
        ));
    }
    Ok(key)
}

/// Validates `key` and `value` of `setCookie`. An empty value is allowed.
///
/// # Errors
///
/// Returns a validation error when either field is missing.
pub fn cookie_entry(params: &CallParams<'_>) -> Result<CookieEntry, BridgeError> {
    let key = cookie_key(params)?;
    let value = params.present_str("value", "Must provide value")?;
    Ok(CookieEntry::new(key, value))
}

fn parse_method(raw: &str) -> Result<Method, BridgeError> {
    let upper = raw.trim().to_ascii_uppercase();
    if !SUPPORTED_METHODS.contains(&upper.as_str()) {
        return Err(BridgeError::invalid(
            "method",
            format!("Unsupported HTTP method '{raw}'"),
        ));
    }
    Method::from_bytes(upper.as_bytes())
        .map_err(|_| BridgeError::invalid("method", format!("Unsupported HTTP method '{raw}'")))
}

fn optional_method(params: &CallParams<'_>, default: Method) -> Result<Method, BridgeError> {
    match params.optional_str("method")? {
        Some(raw) if !raw.trim().is_empty() => parse_method(raw),
        _ => Ok(default),
    }
}

fn parse_url(raw: &str) -> Result<Url, BridgeError> {
    let url = Url::parse(raw.trim()).map_err(|_| BridgeError::invalid("url", "Invalid URL"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(BridgeError::invalid(
            "url",
            format!("Invalid URL: only http and https are supported ({raw})"),
        ));
    }
    Ok(url)
}

/// URL, headers, query parameters, response type and timeout.
fn base_request(
    params: &CallParams<'_>,
    raw_url: &str,
    method: Method,
) -> Result<RequestSpec, BridgeError> {
    let mut url = parse_url(raw_url)?;
    if let Some(query) = params.optional_object("params")? {
        let pairs = string_pairs("params", query)?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
    }

    let mut spec = RequestSpec::new(method, url);
    if let Some(headers) = params.optional_object("headers")? {
        spec.headers = header_pairs(headers)?;
    }
    if let Some(raw) = params.optional_str("responseType")? {
        let response_type = raw
            .parse::<ResponseType>()
            .map_err(|message| BridgeError::invalid("responseType", message))?;
        spec.response_type = Some(response_type);
    }
    spec.read_timeout = read_timeout(params)?;
    Ok(spec)
}

fn read_timeout(params: &CallParams<'_>) -> Result<Option<Duration>, BridgeError> {
    match params.get("readTimeout") {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .filter(|ms| *ms > 0)
            .map(|ms| Some(Duration::from_millis(ms)))
            .ok_or_else(|| {
                BridgeError::invalid(
                    "readTimeout",
                    "readTimeout must be a positive number of milliseconds",
                )
            }),
    }
}

fn file_ref(
    params: &CallParams<'_>,
    file_path: &str,
    files: &FileStore,
) -> Result<FileRef, BridgeError> {
    let directory = match params.optional_str("fileDirectory")? {
        Some(tag) => tag
            .parse::<Directory>()
            .map_err(|e| BridgeError::invalid("fileDirectory", e.to_string()))?,
        None => DEFAULT_DIRECTORY,
    };
    files.root(directory)?;
    FileRef::new(directory, file_path)
}

/// Scalar values are stringified; arrays repeat the key.
fn scalar_strings(field: &'static str, key: &str, value: &Value) -> Result<Vec<String>, BridgeError> {
    let scalar = |v: &Value| match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(BridgeError::invalid(
            field,
            format!("{field}.{key} must be a string, number, boolean or an array of them"),
        )),
    };
    match value {
        Value::Array(items) => items.iter().map(scalar).collect(),
        other => scalar(other).map(|s| vec![s]),
    }
}

fn string_pairs(
    field: &'static str,
    map: &Map<String, Value>,
) -> Result<Vec<(String, String)>, BridgeError> {
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        for item in scalar_strings(field, key, value)? {
            pairs.push((key.clone(), item));
        }
    }
    Ok(pairs)
}

fn header_pairs(map: &Map<String, Value>) -> Result<Vec<(HeaderName, HeaderValue)>, BridgeError> {
    let mut headers = Vec::with_capacity(map.len());
    for (name, value) in string_pairs("headers", map)? {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| BridgeError::invalid("headers", format!("Invalid header name '{name}'")))?;
        let header_value = HeaderValue::from_str(&value).map_err(|_| {
            BridgeError::invalid("headers", format!("Invalid value for header '{name}'"))
        })?;
        headers.push((header_name, header_value));
    }
    Ok(headers)
}

/// Chooses the body encoding from the request's Content-Type.
fn request_body(
    params: &CallParams<'_>,
    spec: &mut RequestSpec,
) -> Result<Option<RequestBody>, BridgeError> {
    let Some(data) = params.get("data") else {
        return Ok(None);
    };
    let content_type = spec
        .headers
        .iter()
        .find(|(name, _)| *name == CONTENT_TYPE)
        .and_then(|(_, value)| value.to_str().ok())
        .map(str::to_ascii_lowercase);

    let body = match content_type.as_deref() {
        Some(ct) if is_json_content_type(ct) => RequestBody::Json(data.clone()),
        Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
            RequestBody::Form(string_pairs("data", data_object(data)?)?)
        }
        Some(ct) if ct.starts_with("multipart/form-data") => {
            let fields = string_pairs("data", data_object(data)?)?;
            spec.headers.retain(|(name, _)| *name != CONTENT_TYPE);
            RequestBody::Multipart(fields)
        }
        _ => match data {
            Value::String(text) => RequestBody::Text(text.clone()),
            other => RequestBody::Json(other.clone()),
        },
    };
    Ok(Some(body))
}

fn data_object(data: &Value) -> Result<&Map<String, Value>, BridgeError> {
    data.as_object().ok_or_else(|| {
        BridgeError::invalid("data", "data must be an object for form and multipart bodies")
    })
}
