//! The boundary between the request pipeline and the network.
//!
//! A [`Transport`] receives a fully prepared [`TransportRequest`] (resolved URL,
//! flattened headers, encoded body) and produces a [`TransportResponse`] or a
//! [`TransportError`]. Each request carries a [`RequestHandle`] which can abort it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut as _, Bytes, BytesMut};
use http::StatusCode;
use http_body::Body;
use http_body_util::{BodyExt as _, Full};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{Method, ProgressEvent, ProgressHandler, ResponseType};
use crate::headers::HeaderSet;
use crate::{BoxError, BoxFuture, DebugLiteral};

#[cfg(feature = "http")]
mod http1;
#[cfg(any(test, feature = "mocks"))]
pub mod mock;
mod service;
mod timeout;

#[cfg(feature = "http")]
pub use self::http1::HttpTransport;
#[cfg(any(test, feature = "mocks"))]
pub use self::mock::{MockReply, MockTransport};
pub use self::service::ServiceTransport;

/// Sends prepared requests.
pub trait Transport: Send + Sync + 'static {
    /// Send one request.
    ///
    /// Implementations should stop work and return [`TransportError::Aborted`] once
    /// the request's handle is aborted, and honour [`TransportOptions::timeout`].
    fn send(&self, request: TransportRequest) -> BoxFuture<'static, Result<TransportResponse, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: TransportRequest) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: TransportRequest) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        (**self).send(request)
    }
}

/// Errors reported by a [`Transport`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request failed before a response status was received.
    #[error("network error: {0}")]
    Network(#[source] BoxError),

    /// The request exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The request was aborted through its handle.
    #[error("request aborted")]
    Aborted,

    /// The request could not be encoded for the wire.
    #[error("invalid request: {0}")]
    InvalidRequest(#[source] BoxError),
}

impl TransportError {
    /// Wrap a network level failure.
    pub fn network<E: Into<BoxError>>(error: E) -> Self {
        TransportError::Network(error.into())
    }
}

/// Per-request options passed through to the transport.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Deadline for the whole exchange, if any.
    pub timeout: Option<Duration>,

    /// How the caller wants the body presented.
    pub response_type: ResponseType,

    /// Whether credentials should accompany cross-origin requests.
    pub with_credentials: bool,

    /// Upload progress callback.
    pub on_upload_progress: Option<ProgressHandler>,

    /// Download progress callback.
    pub on_download_progress: Option<ProgressHandler>,
}

/// A request, ready to go on the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Request method.
    pub method: Method,

    /// Fully resolved URL, including the query string.
    pub url: String,

    /// Flattened request headers.
    pub headers: HeaderSet,

    /// Encoded body, if any.
    pub body: Option<Bytes>,

    /// Transport options.
    pub options: TransportOptions,

    /// Handle which aborts this request.
    pub handle: RequestHandle,
}

impl TransportRequest {
    /// Convert into an [`http::Request`].
    pub fn to_http(&self) -> Result<http::Request<Full<Bytes>>, TransportError> {
        let mut builder = http::Request::builder()
            .method(http::Method::from(self.method))
            .uri(self.url.as_str());

        for (name, value) in self.headers.iter() {
            builder = builder.header(name, value);
        }

        builder
            .body(Full::new(self.body.clone().unwrap_or_default()))
            .map_err(|error| TransportError::InvalidRequest(error.into()))
    }

    /// Report the whole body as uploaded.
    pub(crate) fn report_upload(&self) {
        if let (Some(progress), Some(body)) = (&self.options.on_upload_progress, &self.body) {
            let total = body.len() as u64;
            progress.call(ProgressEvent {
                loaded: total,
                total: Some(total),
            });
        }
    }
}

/// A response as received from the wire.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Response status.
    pub status: StatusCode,

    /// Reason phrase.
    pub status_text: String,

    /// Response headers.
    pub headers: HeaderSet,

    /// The complete body.
    pub body: Bytes,
}

impl TransportResponse {
    /// A response with the canonical reason phrase for `status`.
    pub fn new(status: StatusCode, headers: HeaderSet, body: Bytes) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        }
    }

    /// Collect an [`http::Response`], reporting download progress per data frame.
    pub async fn from_http<B>(
        response: http::Response<B>,
        progress: Option<&ProgressHandler>,
    ) -> Result<Self, TransportError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        let mut body = std::pin::pin!(body);
        let total = parts
            .headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        let mut buffer = BytesMut::new();
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(TransportError::network)?;
            if let Ok(data) = frame.into_data() {
                buffer.put(data);
                if let Some(progress) = progress {
                    progress.call(ProgressEvent {
                        loaded: buffer.len() as u64,
                        total,
                    });
                }
            }
        }

        Ok(Self::new(
            parts.status,
            HeaderSet::from(&parts.headers),
            buffer.freeze(),
        ))
    }
}

type AbortHook = Box<dyn FnOnce() + Send>;

struct HandleRef {
    method: Method,
    url: String,
    aborted: watch::Sender<bool>,
    hooks: Mutex<Vec<AbortHook>>,
}

/// Shared handle to an in-flight request.
///
/// Clones refer to the same request.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<HandleRef>,
}

impl RequestHandle {
    /// A handle for a request to `url`.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let (aborted, _) = watch::channel(false);
        Self {
            inner: Arc::new(HandleRef {
                method,
                url: url.into(),
                aborted,
                hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Request method.
    pub fn method(&self) -> Method {
        self.inner.method
    }

    /// Resolved URL.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Whether the request has been aborted.
    pub fn is_aborted(&self) -> bool {
        *self.inner.aborted.borrow()
    }

    /// Abort the request. Abort hooks run on the first call only; later calls
    /// return `false`.
    pub fn abort(&self) -> bool {
        let fired = self.inner.aborted.send_if_modified(|aborted| {
            let first = !*aborted;
            *aborted = true;
            first
        });
        if !fired {
            return false;
        }

        tracing::trace!(url = %self.inner.url, "request aborted");
        let hooks = std::mem::take(&mut *self.inner.hooks.lock());
        for hook in hooks {
            hook();
        }
        true
    }

    /// Run `hook` when the request is aborted, or right away if it already was.
    pub fn on_abort<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut hooks = self.inner.hooks.lock();
            if !self.is_aborted() {
                hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    /// Resolves once the request is aborted.
    pub async fn aborted(&self) {
        let mut receiver = self.inner.aborted.subscribe();
        if receiver.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("method", &self.inner.method)
            .field("url", &self.inner.url)
            .field("aborted", &self.is_aborted())
            .field("hooks", &DebugLiteral(self.inner.hooks.lock().len()))
            .finish()
    }
}

/// Drive `exchange` under the request's deadline, giving up when the handle is aborted.
pub(crate) async fn drive<F, T>(request: &TransportRequest, exchange: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    let handle = request.handle.clone();
    tokio::select! {
        biased;
        _ = handle.aborted() => Err(TransportError::Aborted),
        outcome = timeout::Timeout::new(exchange, request.options.timeout) => outcome,
    }
}
