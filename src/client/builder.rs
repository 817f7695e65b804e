use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{merge_config, RequestConfig};
use crate::cookie::CookieStore;
use crate::dispatch::Dispatcher;
use crate::transport::Transport;
use crate::url::Origin;
use crate::DebugLiteral;

use super::Client;

/// A builder for a [`Client`].
///
/// Starts from [`RequestConfig::defaults`]; options set here are merged over them.
pub struct Builder<T = ()> {
    transport: T,
    defaults: RequestConfig,
    cookies: Option<Arc<dyn CookieStore>>,
    origin: Option<Origin>,
}

impl Builder<()> {
    /// Create a new builder without a transport.
    pub fn new() -> Self {
        Self {
            transport: (),
            defaults: RequestConfig::defaults(),
            cookies: None,
            origin: None,
        }
    }
}

#[cfg(feature = "http")]
impl Default for Builder<crate::transport::HttpTransport> {
    fn default() -> Self {
        Builder::new().with_transport(crate::transport::HttpTransport::default())
    }
}

impl<T> Builder<T> {
    /// Provide a custom transport.
    pub fn with_transport<T2>(self, transport: T2) -> Builder<T2> {
        Builder {
            transport,
            defaults: self.defaults,
            cookies: self.cookies,
            origin: self.origin,
        }
    }

    /// Merge `config` over the defaults.
    pub fn with_defaults(mut self, config: RequestConfig) -> Self {
        self.defaults = merge_config(&self.defaults, &config);
        self
    }

    /// Replace the defaults entirely, dropping the built-in ones.
    pub fn with_raw_defaults(mut self, config: RequestConfig) -> Self {
        self.defaults = config;
        self
    }

    /// Set the base URL for relative request URLs.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.defaults.base_url = Some(base_url.into());
        self
    }

    /// Set the default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = Some(timeout);
        self
    }

    /// Set a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults
            .headers
            .get_or_insert_with(Default::default)
            .common_mut()
            .insert(name, value);
        self
    }

    /// Cookie store consulted for the XSRF token.
    pub fn with_cookie_store<C: CookieStore>(mut self, cookies: C) -> Self {
        self.cookies = Some(Arc::new(cookies));
        self
    }

    /// The origin requests are considered same-origin with.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for Builder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("transport", &self.transport)
            .field("defaults", &self.defaults)
            .field("cookies", &self.cookies.as_ref().map(|_| DebugLiteral("<cookies>")))
            .field("origin", &self.origin)
            .finish()
    }
}

impl<T: Transport> Builder<T> {
    /// Build the client.
    pub fn build(self) -> Client {
        let dispatcher = Dispatcher::new(Arc::new(self.transport), self.cookies, self.origin);
        Client::from_parts(self.defaults, dispatcher)
    }
}
