//! Generic HTTP request execution.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use super::response::{HttpResponse, ResponseType};
use crate::error::BridgeError;

/// A validated request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Absolute http(s) URL, query parameters already applied.
    pub url: Url,
    /// HTTP verb.
    pub method: Method,
    /// Request headers in call order; repeated names are sent repeatedly.
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Optional request body.
    pub body: Option<RequestBody>,
    /// How the caller wants the response body.
    pub response_type: Option<ResponseType>,
    /// Per-call timeout overriding the configured read timeout.
    pub read_timeout: Option<Duration>,
}

impl RequestSpec {
    /// Creates a bodiless request with no headers.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            headers: Vec::new(),
            body: None,
            response_type: None,
            read_timeout: None,
        }
    }

    /// Returns true when a header named `name` is present.
    #[must_use]
    pub fn has_header(&self, name: &HeaderName) -> bool {
        self.headers.iter().any(|(n, _)| n == name)
    }
}

/// Body encodings derived from the call's `data` and `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent verbatim.
    Text(String),
    /// Serialized as JSON.
    Json(Value),
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` text fields.
    Multipart(Vec<(String, String)>),
}

/// Applies method, URL, headers and timeout to a new request builder.
pub(crate) fn request_builder(client: &Client, spec: &RequestSpec) -> RequestBuilder {
    let mut builder = client.request(spec.method.clone(), spec.url.clone());
    for (name, value) in &spec.headers {
        builder = builder.header(name.clone(), value.clone());
    }
    if let Some(timeout) = spec.read_timeout {
        builder = builder.timeout(timeout);
    }
    builder
}

fn attach_body(builder: RequestBuilder, spec: &RequestSpec) -> RequestBuilder {
    match &spec.body {
        None => builder,
        Some(RequestBody::Text(text)) => builder.body(text.clone()),
        Some(RequestBody::Json(value)) => {
            let builder = if spec.has_header(&CONTENT_TYPE) {
                builder
            } else {
                builder.header(CONTENT_TYPE, "application/json")
            };
            builder.body(value.to_string())
        }
        Some(RequestBody::Form(fields)) => {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish();
            let builder = if spec.has_header(&CONTENT_TYPE) {
                builder
            } else {
                builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            };
            builder.body(encoded)
        }
        Some(RequestBody::Multipart(fields)) => {
            let form = fields
                .iter()
                .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                    form.text(name.clone(), value.clone())
                });
            builder.multipart(form)
        }
    }
}

/// Executes one request per call. No retries.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
}

impl RequestExecutor {
    /// Creates an executor over a configured client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Sends the request and reads the whole response.
    ///
    /// Non-success statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Network`] or [`BridgeError::Timeout`] when the
    /// transport fails.
    #[instrument(skip(self, spec), fields(method = %spec.method, url = %spec.url))]
    pub async fn execute(&self, spec: &RequestSpec) -> Result<HttpResponse, BridgeError> {
        debug!("sending request");
        let builder = attach_body(request_builder(&self.client, spec), spec);
        let response = builder
            .send()
            .await
            .map_err(|e| BridgeError::network(spec.url.as_str(), e))?;
        let response = HttpResponse::read(response, spec.response_type).await?;
        info!(status = response.status, "request complete");
        Ok(response)
    }
}
