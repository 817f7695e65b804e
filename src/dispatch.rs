//! Turns an effective configuration into a transport request, and the transport's
//! answer into a [`Response`].

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, trace};

use crate::config::{RequestConfig, ResponseType};
use crate::cookie::CookieStore;
use crate::data::{transform, Data};
use crate::headers::{flatten_headers, Headers};
use crate::response::Response;
use crate::transport::{
    RequestHandle, Transport, TransportError, TransportOptions, TransportRequest, TransportResponse,
};
use crate::url::{build_url, is_same_origin, resolve_url, Origin};
use crate::{DebugLiteral, Error};

/// The client resources needed to send a request.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    cookies: Option<Arc<dyn CookieStore>>,
    origin: Option<Origin>,
}

impl Dispatcher {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        cookies: Option<Arc<dyn CookieStore>>,
        origin: Option<Origin>,
    ) -> Self {
        Self {
            transport,
            cookies,
            origin,
        }
    }

    /// Send one request described by `config`.
    pub(crate) async fn dispatch(&self, mut config: RequestConfig) -> Result<Response, Error> {
        if let Some(token) = &config.cancel_token {
            if let Err(reason) = token.throw_if_requested() {
                debug!("request cancelled before dispatch");
                return Err(Error::from(reason).with_config(config));
            }
        }

        let method = config.method.unwrap_or_default();
        let url = resolve_url(config.base_url.as_deref(), config.url.as_deref().unwrap_or_default());
        let url = build_url(&url, config.params.as_ref(), config.params_serializer.as_ref());
        trace!(%method, %url, "url resolved");

        let data = transform(
            config.data.take().unwrap_or_default(),
            config.headers.get_or_insert_with(Headers::default).top_mut(),
            config.transform_request.as_ref(),
        );
        config.data = Some(data.clone());
        trace!("request transformed");

        let mut headers = flatten_headers(config.headers.as_ref(), method).unwrap_or_default();
        let body = match data.into_body() {
            Ok(body) => body,
            Err(error) => {
                return Err(Error::invalid_request("form payload could not be encoded", error).with_config(config))
            }
        };
        if body.is_none() {
            headers.remove("Content-Type");
        }

        let with_credentials = config.with_credentials.unwrap_or(false);
        if with_credentials || is_same_origin(&url, self.origin.as_ref()) {
            if let (Some(cookies), Some(cookie), Some(header)) = (
                &self.cookies,
                &config.xsrf_cookie_name,
                &config.xsrf_header_name,
            ) {
                if let Some(value) = cookies.read(cookie).filter(|value| !value.is_empty()) {
                    trace!(%header, "xsrf header set");
                    headers.insert(header.clone(), value);
                }
            }
        }

        if let Some(auth) = &config.auth {
            let credentials = STANDARD.encode(format!("{}:{}", auth.username, auth.password));
            headers.insert("Authorization", format!("Basic {credentials}"));
        }

        let handle = RequestHandle::new(method, url.clone());
        let request = TransportRequest {
            method,
            url,
            headers,
            body,
            options: TransportOptions {
                timeout: config.timeout.filter(|timeout| !timeout.is_zero()),
                response_type: config.response_type.unwrap_or_default(),
                with_credentials,
                on_upload_progress: config.on_upload_progress.clone(),
                on_download_progress: config.on_download_progress.clone(),
            },
            handle: handle.clone(),
        };

        trace!("sending");
        let sending = self.transport.send(request);
        let outcome = match config.cancel_token.clone() {
            Some(token) => tokio::select! {
                biased;
                reason = token.cancelled() => {
                    handle.abort();
                    debug!(reason = %reason, "request cancelled in flight");
                    return Err(Error::from(reason).with_config(config).with_request(handle));
                }
                outcome = sending => outcome,
            },
            None => sending.await,
        };

        let received = match outcome {
            Ok(received) => received,
            Err(error) => {
                debug!(%error, "transport failed");
                return Err(transport_error(error).with_config(config).with_request(handle));
            }
        };

        let TransportResponse {
            status,
            status_text,
            mut headers,
            body,
        } = received;

        let data = match config.response_type.unwrap_or_default() {
            ResponseType::Bytes => Data::Bytes(body),
            ResponseType::Text | ResponseType::Json => match std::str::from_utf8(&body) {
                Ok(text) => Data::Text(text.to_owned()),
                Err(_) => Data::Bytes(body),
            },
        };
        let data = transform(data, &mut headers, config.transform_response.as_ref());
        trace!("response transformed");

        let valid = match &config.validate_status {
            Some(validate) => validate.check(status),
            None => status.is_success(),
        };
        debug!(%status, valid, "response received");

        let response = Response {
            data,
            status,
            status_text,
            headers,
            config,
            request: handle,
        };

        if valid {
            Ok(response)
        } else {
            Err(Error::validation(response))
        }
    }
}

fn transport_error(error: TransportError) -> Error {
    match error {
        TransportError::Network(source) => Error::network(source),
        TransportError::Timeout(timeout) => Error::timeout(timeout),
        TransportError::Aborted => Error::aborted(),
        TransportError::InvalidRequest(source) => Error::invalid_request(source.to_string(), source),
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &DebugLiteral("<transport>"))
            .field("cookies", &self.cookies.as_ref().map(|_| DebugLiteral("<cookies>")))
            .field("origin", &self.origin)
            .finish()
    }
}
