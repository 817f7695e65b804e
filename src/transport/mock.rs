//! An in-memory transport for tests.
//!
//! Replies are scripted up front and handed out in order; once the script runs out,
//! every request gets an empty `200 OK`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt as _;
use http::StatusCode;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{drive, Transport, TransportError, TransportRequest, TransportResponse};
use crate::config::ProgressEvent;
use crate::headers::HeaderSet;
use crate::BoxFuture;

/// A scripted transport outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with this status, headers and body.
    Respond(TransportResponse),

    /// Respond `200 OK` with the request's own headers and body.
    Echo,

    /// Fail with a network error carrying this message.
    Fail(String),

    /// Never complete; only an abort or a timeout ends the request.
    Hang,

    /// Wait, then produce the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    /// A response with an empty body.
    pub fn status(status: u16) -> Self {
        Self::text(status, "")
    }

    /// A `text/plain` response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::with_body(status, "text/plain", Bytes::from(body.into()))
    }

    /// An `application/json` response.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::with_body(status, "application/json", Bytes::from(body.to_string()))
    }

    /// Delay this reply.
    pub fn after(self, delay: Duration) -> Self {
        MockReply::Delay(delay, Box::new(self))
    }

    fn with_body(status: u16, content_type: &str, body: Bytes) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut headers = HeaderSet::new();
        if !body.is_empty() {
            headers.insert("Content-Type", content_type);
        }
        MockReply::Respond(TransportResponse::new(status, headers, body))
    }

    async fn play(self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut reply = self;
        loop {
            match reply {
                MockReply::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                MockReply::Hang => std::future::pending::<()>().await,
                MockReply::Fail(message) => return Err(TransportError::network(message)),
                MockReply::Echo => {
                    return Ok(TransportResponse::new(
                        StatusCode::OK,
                        request.headers.clone(),
                        request.body.clone().unwrap_or_default(),
                    ))
                }
                MockReply::Respond(response) => return Ok(response),
            }
        }
    }
}

#[derive(Debug)]
struct MockState {
    script: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<TransportRequest>>,
    received: watch::Sender<usize>,
    aborts: Arc<AtomicUsize>,
}

/// A transport which plays back scripted replies and records what it was sent.
///
/// Clones share the same script and records.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    /// A transport with an empty script.
    pub fn new() -> Self {
        let (received, _) = watch::channel(0);
        Self {
            state: Arc::new(MockState {
                script: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                received,
                aborts: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Queue a reply.
    pub fn reply(&self, reply: MockReply) -> &Self {
        self.state.script.lock().push_back(reply);
        self
    }

    /// Queue a reply, builder style.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.reply(reply);
        self
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.state.requests.lock().clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<TransportRequest> {
        self.state.requests.lock().last().cloned()
    }

    /// How many request handles have been aborted.
    pub fn aborts(&self) -> usize {
        self.state.aborts.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` requests have reached the transport.
    pub async fn received(&self, count: usize) {
        let mut receiver = self.state.received.subscribe();
        // The sender lives in `state`, which we hold.
        let _ = receiver.wait_for(|received| *received >= count).await;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        let aborts = self.state.aborts.clone();
        request.handle.on_abort(move || {
            aborts.fetch_add(1, Ordering::SeqCst);
        });

        let reply = self
            .state
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockReply::status(200));
        self.state.requests.lock().push(request.clone());
        self.state.received.send_modify(|received| *received += 1);
        tracing::trace!(url = %request.url, ?reply, "mock request received");

        async move {
            drive(&request, async {
                let response = reply.play(&request).await?;
                request.report_upload();
                if let Some(progress) = &request.options.on_download_progress {
                    let total = response.body.len() as u64;
                    progress.call(ProgressEvent {
                        loaded: total,
                        total: Some(total),
                    });
                }
                Ok(response)
            })
            .await
        }
        .boxed()
    }
}
