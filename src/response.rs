//! Responses produced by the pipeline.

use http::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::RequestConfig;
use crate::data::Data;
use crate::headers::HeaderSet;
use crate::transport::RequestHandle;

/// A response, after the response transformers have run.
#[derive(Debug, Clone)]
pub struct Response {
    /// Transformed payload.
    pub data: Data,

    /// Response status.
    pub status: StatusCode,

    /// Reason phrase reported by the transport.
    pub status_text: String,

    /// Response headers.
    pub headers: HeaderSet,

    /// The effective configuration the request was sent with.
    pub config: RequestConfig,

    /// Handle to the underlying transport request.
    pub request: RequestHandle,
}

impl Response {
    /// Deserialize the payload.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        self.data.deserialize()
    }
}
