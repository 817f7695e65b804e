//! Client errors.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::cancel::Cancel;
use crate::config::RequestConfig;
use crate::response::Response;
use crate::transport::RequestHandle;
use crate::BoxError;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The response status was rejected by `validate_status`.
    Validation,

    /// The transport failed before a status was received.
    Network,

    /// The transport exceeded the configured timeout.
    Timeout,

    /// The request's cancel token fired.
    Cancelled,

    /// The request could not be built, e.g. an invalid header.
    InvalidRequest,

    /// An interceptor failed.
    Interceptor,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::Interceptor => "interceptor",
        })
    }
}

/// Error produced by the request pipeline.
///
/// Carries the effective configuration and the transport handle when they are
/// known, and the full [`Response`] for validation failures.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    code: Option<&'static str>,
    config: Option<Box<RequestConfig>>,
    request: Option<RequestHandle>,
    response: Option<Box<Response>>,
    cancel: Option<Cancel>,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            config: None,
            request: None,
            response: None,
            cancel: None,
            source: None,
        }
    }

    /// An error raised by an interceptor.
    pub fn interceptor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Interceptor, message)
    }

    /// Wrap another error raised by an interceptor.
    pub fn from_source<E>(source: E) -> Self
    where
        E: Into<BoxError>,
    {
        let source = source.into();
        let mut error = Self::new(ErrorKind::Interceptor, source.to_string());
        error.source = Some(source);
        error
    }

    pub(crate) fn validation(response: Response) -> Self {
        let mut error = Self::new(
            ErrorKind::Validation,
            format!("Request failed with status code {}", response.status.as_u16()),
        );
        error.code = Some("ERR_BAD_RESPONSE");
        error.config = Some(Box::new(response.config.clone()));
        error.request = Some(response.request.clone());
        error.response = Some(Box::new(response));
        error
    }

    pub(crate) fn network(source: BoxError) -> Self {
        let mut error = Self::new(ErrorKind::Network, "Network Error");
        error.code = Some("ERR_NETWORK");
        error.source = Some(source);
        error
    }

    pub(crate) fn timeout(timeout: Duration) -> Self {
        let mut error = Self::new(
            ErrorKind::Timeout,
            format!("Timeout of {} ms exceeded", timeout.as_millis()),
        );
        error.code = Some("ECONNABORTED");
        error
    }

    pub(crate) fn aborted() -> Self {
        let mut error = Self::new(ErrorKind::Network, "Request aborted");
        error.code = Some("ECONNABORTED");
        error
    }

    pub(crate) fn cancelled(cancel: Cancel) -> Self {
        let mut error = Self::new(ErrorKind::Cancelled, cancel.to_string());
        error.code = Some("ERR_CANCELED");
        error.cancel = Some(cancel);
        error
    }

    pub(crate) fn invalid_request<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        let mut error = Self::new(ErrorKind::InvalidRequest, message);
        error.code = Some("ERR_BAD_REQUEST");
        error.source = Some(source.into());
        error
    }

    pub(crate) fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(Box::new(config));
        self
    }

    pub(crate) fn with_request(mut self, request: RequestHandle) -> Self {
        self.request = Some(request);
        self
    }

    /// What went wrong.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine readable code, e.g. `ECONNABORTED` for timeouts.
    pub fn code(&self) -> Option<&str> {
        self.code
    }

    /// The effective configuration of the failed request.
    pub fn config(&self) -> Option<&RequestConfig> {
        self.config.as_deref()
    }

    /// Handle to the transport request.
    pub fn request(&self) -> Option<&RequestHandle> {
        self.request.as_ref()
    }

    /// The rejected response, for validation failures.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    /// Take the rejected response.
    pub fn into_response(self) -> Option<Response> {
        self.response.map(|response| *response)
    }

    /// The cancellation reason, for cancelled requests.
    pub fn cancel(&self) -> Option<&Cancel> {
        self.cancel.as_ref()
    }

    /// Whether the request was cancelled.
    pub fn is_cancel(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Whether the request timed out.
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

impl From<Cancel> for Error {
    fn from(cancel: Cancel) -> Self {
        Error::cancelled(cancel)
    }
}
