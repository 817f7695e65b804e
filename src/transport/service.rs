//! Adapts a [`tower::Service`] into a [`Transport`].

use std::fmt;

use bytes::Bytes;
use futures_util::FutureExt as _;
use http_body::Body;
use http_body_util::Full;
use tower::{Service, ServiceExt as _};

use super::{drive, Transport, TransportError, TransportRequest, TransportResponse};
use crate::{BoxError, BoxFuture};

/// Sends requests through any HTTP [`Service`], such as a pooled client or a
/// test router.
#[derive(Clone)]
pub struct ServiceTransport<S> {
    service: S,
}

impl<S> ServiceTransport<S> {
    /// Wrap a service.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// The wrapped service.
    pub fn service(&self) -> &S {
        &self.service
    }
}

impl<S> fmt::Debug for ServiceTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTransport").finish()
    }
}

impl<S, B> Transport for ServiceTransport<S>
where
    S: Service<http::Request<Full<Bytes>>, Response = http::Response<B>> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    fn send(&self, request: TransportRequest) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        let service = self.service.clone();
        async move {
            drive(&request, async {
                let outgoing = request.to_http()?;
                let response = service
                    .oneshot(outgoing)
                    .await
                    .map_err(TransportError::network)?;
                request.report_upload();
                TransportResponse::from_http(response, request.options.on_download_progress.as_ref())
                    .await
            })
            .await
        }
        .boxed()
    }
}
