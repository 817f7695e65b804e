//! Request configuration.
//!
//! A [`RequestConfig`] describes one request, or the defaults a [`Client`](crate::Client)
//! applies to every request. Known options are typed fields; anything else can be
//! carried in [`RequestConfig::extensions`] and survives merging untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::data::{Data, Transformers};
use crate::headers::Headers;
use crate::url::Params;
use crate::DebugLiteral;

mod defaults;
pub mod merge;

pub use self::merge::{merge_config, Field, Merge, MergeStrategy};

/// HTTP methods understood by the client.
///
/// Parsing is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
}

impl Method {
    /// Every method, in the order header partitions are listed.
    pub const ALL: [Method; 7] = [
        Method::Delete,
        Method::Get,
        Method::Head,
        Method::Options,
        Method::Post,
        Method::Put,
        Method::Patch,
    ];

    /// Lower-case name, which is also the name of the method's header partition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Delete => "delete",
            Method::Head => "head",
            Method::Options => "options",
            Method::Post => "post",
            Method::Put => "put",
            Method::Patch => "patch",
        }
    }

    /// Whether the shorthand for this method carries a request body.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// Error returned when parsing an unsupported method name.
#[derive(Debug, Error)]
#[error("unsupported method: {0}")]
pub struct InvalidMethod(String);

impl FromStr for Method {
    type Err = InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| InvalidMethod(s.to_owned()))
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Delete => http::Method::DELETE,
            Method::Head => http::Method::HEAD,
            Method::Options => http::Method::OPTIONS,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
        }
    }
}

/// How the response body should be presented to the response transformers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Decode as UTF-8 text, falling back to bytes when the body is not valid UTF-8.
    #[default]
    Text,
    /// Same as text at the dispatch layer; the default response transformer parses it.
    Json,
    /// Keep the raw bytes.
    Bytes,
}

/// Username and password for HTTP basic authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl BasicAuth {
    /// Create new credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Progress of an upload or download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes transferred so far.
    pub loaded: u64,

    /// Total bytes, when known.
    pub total: Option<u64>,
}

/// Callback receiving [`ProgressEvent`]s.
#[derive(Clone)]
pub struct ProgressHandler(Arc<dyn Fn(ProgressEvent) + Send + Sync>);

impl ProgressHandler {
    /// Wrap a callback.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// Deliver an event.
    pub fn call(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}

impl fmt::Debug for ProgressHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProgressHandler")
            .field(&DebugLiteral("<fn>"))
            .finish()
    }
}

impl PartialEq for ProgressHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Predicate deciding which response statuses count as success.
#[derive(Clone)]
pub struct ValidateStatus(Arc<dyn Fn(StatusCode) -> bool + Send + Sync>);

impl ValidateStatus {
    /// Wrap a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Accepts `200 <= status < 300`.
    pub fn success() -> Self {
        Self::new(|status| status.is_success())
    }

    /// Whether `status` is acceptable.
    pub fn check(&self, status: StatusCode) -> bool {
        (self.0)(status)
    }
}

impl fmt::Debug for ValidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValidateStatus")
            .field(&DebugLiteral("<fn>"))
            .finish()
    }
}

impl PartialEq for ValidateStatus {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Caller supplied query string serializer, replacing the built-in encoding.
#[derive(Clone)]
pub struct ParamsSerializer(Arc<dyn Fn(&Params) -> String + Send + Sync>);

impl ParamsSerializer {
    /// Wrap a serializer.
    pub fn new<F>(serializer: F) -> Self
    where
        F: Fn(&Params) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(serializer))
    }

    /// Serialize `params` into a query string (without the leading `?`).
    pub fn serialize(&self, params: &Params) -> String {
        (self.0)(params)
    }
}

impl fmt::Debug for ParamsSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParamsSerializer")
            .field(&DebugLiteral("<fn>"))
            .finish()
    }
}

impl PartialEq for ParamsSerializer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Configuration for a single request, or the defaults of a client.
///
/// Every field is optional: an absent field either falls back to the client
/// defaults or is left out, depending on its [`MergeStrategy`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    /// Request URL, relative to `base_url` unless absolute.
    pub url: Option<String>,

    /// Request method.
    pub method: Option<Method>,

    /// Prefix for relative URLs.
    pub base_url: Option<String>,

    /// Request payload.
    pub data: Option<Data>,

    /// Query parameters appended to the URL.
    pub params: Option<Params>,

    /// Request headers, partitioned by method.
    pub headers: Option<Headers>,

    /// Transport deadline. `Duration::ZERO` means no deadline.
    pub timeout: Option<Duration>,

    /// How to present the response body.
    pub response_type: Option<ResponseType>,

    /// Token which can cancel the request while it is in flight.
    pub cancel_token: Option<CancelToken>,

    /// Send credentials on cross-origin requests, and allow XSRF header injection for them.
    pub with_credentials: Option<bool>,

    /// Cookie holding the XSRF token.
    pub xsrf_cookie_name: Option<String>,

    /// Header carrying the XSRF token.
    pub xsrf_header_name: Option<String>,

    /// Upload progress callback.
    pub on_upload_progress: Option<ProgressHandler>,

    /// Download progress callback.
    pub on_download_progress: Option<ProgressHandler>,

    /// Basic authentication credentials.
    pub auth: Option<BasicAuth>,

    /// Which statuses resolve the request.
    pub validate_status: Option<ValidateStatus>,

    /// Custom query string serializer.
    pub params_serializer: Option<ParamsSerializer>,

    /// Transformers applied to the outgoing payload, in order.
    pub transform_request: Option<Transformers>,

    /// Transformers applied to the incoming payload, in order.
    pub transform_response: Option<Transformers>,

    /// Options this crate does not interpret, preserved verbatim.
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl RequestConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in client defaults.
    pub fn defaults() -> Self {
        self::defaults::defaults()
    }

    /// Set the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the payload.
    pub fn with_data(mut self, data: impl Into<Data>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Append one query parameter.
    pub fn with_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<crate::url::ParamValue>,
    ) -> Self {
        self.params.get_or_insert_with(Params::new).insert(key, value);
        self
    }

    /// Set a top-level (method independent) header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::default)
            .insert(name, value);
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Set the status predicate.
    pub fn with_validate_status<F>(mut self, predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Some(ValidateStatus::new(predicate));
        self
    }

    /// Set basic authentication credentials.
    pub fn with_auth(mut self, auth: BasicAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Store an option this crate does not interpret.
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }
}

impl From<&str> for RequestConfig {
    fn from(url: &str) -> Self {
        RequestConfig::new().with_url(url)
    }
}

impl From<String> for RequestConfig {
    fn from(url: String) -> Self {
        RequestConfig::new().with_url(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use static_assertions::assert_impl_all;

    assert_impl_all!(RequestConfig: Send, Sync, Clone);

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("PATCH".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!("Delete".parse::<Method>().unwrap(), Method::Delete);
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn method_display() {
        assert_eq!(Method::Options.to_string(), "OPTIONS");
        assert_eq!(http::Method::from(Method::Put), http::Method::PUT);
    }

    #[test]
    fn url_string_becomes_config() {
        let config: RequestConfig = "/foo".into();
        assert_eq!(config.url.as_deref(), Some("/foo"));
        assert!(config.method.is_none());
    }

    #[test]
    fn validate_status_success_range() {
        let validate = ValidateStatus::success();
        assert!(validate.check(StatusCode::OK));
        assert!(validate.check(StatusCode::from_u16(299).unwrap()));
        assert!(!validate.check(StatusCode::MULTIPLE_CHOICES));
        assert!(!validate.check(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
