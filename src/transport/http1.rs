//! A minimal HTTP/1.1 transport built on hyper.
//!
//! Every request opens a fresh TCP connection; there is no pooling and no TLS.
//! For anything more involved, wrap a full client in a
//! [`ServiceTransport`](super::ServiceTransport).

use std::fmt;

use bytes::Bytes;
use futures_util::FutureExt as _;
use http_body_util::Full;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::trace;

use super::{drive, Transport, TransportError, TransportRequest, TransportResponse};
use crate::BoxFuture;

/// Sends requests over plain HTTP/1.1.
#[derive(Clone)]
pub struct HttpTransport {
    http1: http1::Builder,
}

impl HttpTransport {
    /// A transport with hyper's default HTTP/1.1 settings.
    pub fn new() -> Self {
        Self {
            http1: http1::Builder::new(),
        }
    }

    /// Get the HTTP/1.1 configuration.
    pub fn http1(&mut self) -> &mut http1::Builder {
        &mut self.http1
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish()
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        let builder = self.http1.clone();
        async move { drive(&request, exchange(&builder, &request)).await }.boxed()
    }
}

fn invalid(message: String) -> TransportError {
    TransportError::InvalidRequest(message.into())
}

async fn exchange(
    builder: &http1::Builder,
    request: &TransportRequest,
) -> Result<TransportResponse, TransportError> {
    let mut outgoing = request.to_http()?;
    let uri = outgoing.uri().clone();

    if uri.scheme_str().is_some_and(|scheme| scheme != "http") {
        return Err(invalid(format!("unsupported scheme in {}", request.url)));
    }
    let authority = uri
        .authority()
        .ok_or_else(|| invalid(format!("no host in {}", request.url)))?;
    let port = authority.port_u16().unwrap_or(80);

    let host = connect_host(authority);
    trace!(host, port, "connecting");
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(TransportError::network)?;

    trace!("handshake h1");
    let (mut sender, conn) = builder
        .handshake::<_, Full<Bytes>>(TokioIo::new(stream))
        .await
        .map_err(TransportError::network)?;
    tokio::spawn(async {
        if let Err(err) = conn.await {
            tracing::error!(%err, "h1 connection driver error");
        }
    });
    trace!("handshake complete");

    if !outgoing.headers().contains_key(http::header::HOST) {
        let host = http::HeaderValue::from_str(authority.as_str())
            .map_err(|error| TransportError::InvalidRequest(error.into()))?;
        outgoing.headers_mut().insert(http::header::HOST, host);
    }
    let path = uri.path_and_query().map_or("/", |path| path.as_str());
    *outgoing.uri_mut() = path
        .parse()
        .map_err(|error: http::uri::InvalidUri| TransportError::InvalidRequest(error.into()))?;

    let response = sender
        .send_request(outgoing)
        .await
        .map_err(TransportError::network)?;
    request.report_upload();
    trace!(status = %response.status(), "response head received");

    TransportResponse::from_http(response, request.options.on_download_progress.as_ref()).await
}

/// The host part of `authority` as the resolver expects it. IPv6 literals lose their brackets.
fn connect_host(authority: &http::uri::Authority) -> &str {
    let host = authority.host();
    host.strip_prefix('[')
        .and_then(|host| host.strip_suffix(']'))
        .unwrap_or(host)
}
