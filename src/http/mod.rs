//! HTTP request and upload execution.
//!
//! Every call performs exactly one attempt. Transport failures become
//! [`BridgeError::Network`](crate::BridgeError::Network) (or `Timeout`);
//! HTTP error statuses are ordinary responses.
//!
//! # Redirects
//!
//! Redirects are followed up to
//! [`BridgeConfig::max_redirects`](crate::BridgeConfig::max_redirects)
//! (10 by default). The response reports the final URL.

mod client;
mod request;
mod response;
mod upload;

pub use client::build_client;
pub use request::{RequestBody, RequestExecutor, RequestSpec};
pub(crate) use request::request_builder;
pub use response::{HttpResponse, ResponseBody, ResponseType};
pub(crate) use response::is_json_content_type;
pub use upload::{DEFAULT_UPLOAD_FIELD, MultipartUpload, UploadExecutor, UploadSpec};
