//! The client: configuration defaults, interceptors and the request entry points.
//!
//! Every request merges the call's [`RequestConfig`] over the client defaults, then
//! runs the request interceptors (newest first), dispatches through the client's
//! [`Transport`](crate::transport::Transport), and runs the response interceptors
//! (oldest first).

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::Instrument as _;

use crate::config::{merge_config, Method, RequestConfig};
use crate::data::Data;
use crate::dispatch::Dispatcher;
use crate::interceptor::Interceptors;
use crate::response::Response;
use crate::url::{build_url, resolve_url};
use crate::Error;

mod builder;
mod chain;

pub use self::builder::Builder;
use self::chain::Pipeline;

struct ClientRef {
    defaults: RwLock<RequestConfig>,
    interceptors: Interceptors,
    dispatcher: Dispatcher,
}

/// An HTTP client with shared defaults and interceptors.
///
/// Cloning a client is cheap; clones share defaults, interceptors and transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientRef>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &*self.inner.defaults.read())
            .field("interceptors", &self.inner.interceptors)
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

#[cfg(feature = "http")]
impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
impl Client {
    /// A client with the built-in defaults, sending over plain HTTP/1.1.
    pub fn new() -> Self {
        Builder::<crate::transport::HttpTransport>::default().build()
    }
}

impl Client {
    /// A builder for a client.
    pub fn builder() -> Builder {
        Builder::new()
    }

    fn from_parts(defaults: RequestConfig, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(ClientRef {
                defaults: RwLock::new(defaults),
                interceptors: Interceptors::default(),
                dispatcher,
            }),
        }
    }

    /// A copy of the current defaults.
    pub fn defaults(&self) -> RequestConfig {
        self.inner.defaults.read().clone()
    }

    /// Modify the defaults. Requests already in flight are not affected.
    pub fn update_defaults<F>(&self, update: F)
    where
        F: FnOnce(&mut RequestConfig),
    {
        update(&mut self.inner.defaults.write());
    }

    /// The request and response interceptor registries.
    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    /// Derive a new client sharing this client's transport, with its own
    /// interceptors and `config` merged over these defaults.
    pub fn create(&self, config: RequestConfig) -> Client {
        let defaults = merge_config(&self.inner.defaults.read(), &config);
        Client::from_parts(defaults, self.inner.dispatcher.clone())
    }

    /// Send a request.
    pub async fn request(&self, config: impl Into<RequestConfig>) -> Result<Response, Error> {
        let config = merge_config(&self.inner.defaults.read(), &config.into());
        let span = tracing::debug_span!(
            "request",
            method = %config.method.unwrap_or_default(),
            url = config.url.as_deref().unwrap_or_default(),
        );

        Pipeline::new(&self.inner.interceptors)
            .run(&self.inner.dispatcher, config)
            .instrument(span)
            .await
    }

    /// Send a request to `url`, with the rest of the configuration in `config`.
    pub async fn request_url(&self, url: impl Into<String>, config: RequestConfig) -> Result<Response, Error> {
        self.request(config.with_url(url)).await
    }

    async fn without_body(&self, method: Method, url: String, config: RequestConfig) -> Result<Response, Error> {
        self.request(config.with_method(method).with_url(url)).await
    }

    async fn with_body(
        &self,
        method: Method,
        url: String,
        data: Option<Data>,
        mut config: RequestConfig,
    ) -> Result<Response, Error> {
        config.data = data;
        self.request(config.with_method(method).with_url(url)).await
    }

    /// Send a `GET` request.
    pub async fn get(&self, url: impl Into<String>, config: RequestConfig) -> Result<Response, Error> {
        self.without_body(Method::Get, url.into(), config).await
    }

    /// Send a `DELETE` request.
    pub async fn delete(&self, url: impl Into<String>, config: RequestConfig) -> Result<Response, Error> {
        self.without_body(Method::Delete, url.into(), config).await
    }

    /// Send a `HEAD` request.
    pub async fn head(&self, url: impl Into<String>, config: RequestConfig) -> Result<Response, Error> {
        self.without_body(Method::Head, url.into(), config).await
    }

    /// Send an `OPTIONS` request.
    pub async fn options(&self, url: impl Into<String>, config: RequestConfig) -> Result<Response, Error> {
        self.without_body(Method::Options, url.into(), config).await
    }

    /// Send a `POST` request with `data` as the payload.
    pub async fn post(
        &self,
        url: impl Into<String>,
        data: Option<Data>,
        config: RequestConfig,
    ) -> Result<Response, Error> {
        self.with_body(Method::Post, url.into(), data, config).await
    }

    /// Send a `PUT` request with `data` as the payload.
    pub async fn put(
        &self,
        url: impl Into<String>,
        data: Option<Data>,
        config: RequestConfig,
    ) -> Result<Response, Error> {
        self.with_body(Method::Put, url.into(), data, config).await
    }

    /// Send a `PATCH` request with `data` as the payload.
    pub async fn patch(
        &self,
        url: impl Into<String>,
        data: Option<Data>,
        config: RequestConfig,
    ) -> Result<Response, Error> {
        self.with_body(Method::Patch, url.into(), data, config).await
    }

    /// The URL a request with `config` would be sent to, without sending it.
    ///
    /// Only the client defaults and the query parameters are applied; interceptors
    /// do not run.
    pub fn get_uri(&self, config: impl Into<RequestConfig>) -> String {
        let config = merge_config(&self.inner.defaults.read(), &config.into());
        let url = resolve_url(config.base_url.as_deref(), config.url.as_deref().unwrap_or_default());
        build_url(&url, config.params.as_ref(), config.params_serializer.as_ref())
    }
}
