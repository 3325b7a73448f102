//! Normalized HTTP responses.

use std::fmt;
use std::str::FromStr;

use base64::prelude::*;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::BridgeError;

/// Caller hint for how the response body should be returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Text,
    Json,
    ArrayBuffer,
    Blob,
    Document,
}

impl ResponseType {
    /// Returns the hint as written by script callers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::ArrayBuffer => "arraybuffer",
            Self::Blob => "blob",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "arraybuffer" => Ok(Self::ArrayBuffer),
            "blob" => Ok(Self::Blob),
            "document" => Ok(Self::Document),
            other => Err(format!(
                "responseType must be one of text, json, arraybuffer, blob, document (got '{other}')"
            )),
        }
    }
}

/// Response body after applying the response type policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Parsed JSON document.
    Json(Value),
    /// UTF-8 text (lossy for invalid sequences).
    Text(String),
    /// Base64 (standard alphabet) of the raw bytes.
    Base64(String),
}

/// Status, headers and body of a completed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers; repeated headers are joined with `", "`.
    pub headers: Map<String, Value>,
    /// Body shaped by the response type policy.
    pub body: ResponseBody,
    /// Final URL after redirects.
    pub url: String,
}

impl HttpResponse {
    /// Reads the full body of `response` and shapes it.
    ///
    /// # Errors
    ///
    /// Returns a network error if the body stream fails.
    pub async fn read(
        response: reqwest::Response,
        response_type: Option<ResponseType>,
    ) -> Result<Self, BridgeError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = header_map_to_json(response.headers());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BridgeError::network(url.clone(), e))?;
        debug!(status, bytes = bytes.len(), "response body received");

        let body = shape_body(&bytes, response_type, content_type.as_deref());
        Ok(Self {
            status,
            headers,
            body,
            url,
        })
    }
}

/// Applies the response type hint, falling back to the content type.
pub(crate) fn shape_body(
    bytes: &[u8],
    response_type: Option<ResponseType>,
    content_type: Option<&str>,
) -> ResponseBody {
    match response_type {
        Some(ResponseType::ArrayBuffer | ResponseType::Blob) => {
            ResponseBody::Base64(BASE64_STANDARD.encode(bytes))
        }
        Some(ResponseType::Json) => parse_json_or_text(bytes),
        Some(ResponseType::Text | ResponseType::Document) => {
            ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned())
        }
        None if content_type.is_some_and(is_json_content_type) => parse_json_or_text(bytes),
        None => ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn parse_json_or_text(bytes: &[u8]) -> ResponseBody {
    serde_json::from_slice(bytes).map_or_else(
        |_| ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        ResponseBody::Json,
    )
}

pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence == "application/json" || essence.ends_with("+json")
}

fn header_map_to_json(headers: &HeaderMap) -> Map<String, Value> {
    let mut out = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        out.insert(name.as_str().to_string(), Value::String(joined));
    }
    out
}
