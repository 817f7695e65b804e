//! Courier
//!
//! An HTTP request pipeline with composable configuration, request and response
//! interceptors, payload transformers and cooperative cancellation, on top of any
//! [`Transport`](transport::Transport).
//!
//! ```no_run
//! # use courier::{Builder, RequestConfig};
//! # use courier::transport::HttpTransport;
//! # async fn run() -> Result<(), courier::Error> {
//! let client = Builder::<HttpTransport>::default()
//!     .with_base_url("http://localhost:8080/api")
//!     .build();
//!
//! client.interceptors().request.use_interceptor(courier::Interceptor::new(
//!     |mut config: RequestConfig| async move {
//!         config = config.with_header("X-Trace", "on");
//!         Ok(config)
//!     },
//! ));
//!
//! let response = client.get("/users", RequestConfig::default()).await?;
//! println!("{}: {:?}", response.status, response.data);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::fmt;

pub mod cancel;
pub mod client;
pub mod config;
pub mod cookie;
pub mod data;
mod dispatch;
pub mod error;
pub mod headers;
pub mod interceptor;
pub mod response;
pub mod transport;
pub mod url;

pub use cancel::{Cancel, CancelToken, CancelTokenSource, Canceler};
pub use client::{Builder, Client};
pub use config::{Method, RequestConfig};
pub use data::Data;
pub use error::{Error, ErrorKind};
pub use headers::{HeaderSet, Headers};
pub use interceptor::{Interceptor, InterceptorId, InterceptorManager, Interceptors};
pub use response::Response;

/// Boxed error type used at the transport boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Boxed future returned by [`Transport::send`](transport::Transport::send).
pub use futures_util::future::BoxFuture;

pub(crate) struct DebugLiteral<T: fmt::Display>(T);

impl<T: fmt::Display> fmt::Debug for DebugLiteral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
