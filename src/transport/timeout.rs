//! Deadline for a transport exchange.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;
use tokio::time::Sleep;

use super::TransportError;

/// Fails with [`TransportError::Timeout`] if `inner` does not finish within the
/// deadline. Without a deadline the inner future runs to completion.
#[derive(Debug)]
#[pin_project]
pub(crate) struct Timeout<F> {
    #[pin]
    inner: F,

    #[pin]
    sleep: Option<Sleep>,
    duration: Duration,
}

impl<F> Timeout<F> {
    pub(crate) fn new(inner: F, duration: Option<Duration>) -> Self {
        Self {
            inner,
            sleep: duration.map(tokio::time::sleep),
            duration: duration.unwrap_or_default(),
        }
    }
}

impl<F, T> Future for Timeout<F>
where
    F: Future<Output = Result<T, TransportError>>,
{
    type Output = Result<T, TransportError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Poll::Ready(outcome) = this.inner.poll(cx) {
            return Poll::Ready(outcome);
        }

        match this.sleep.as_pin_mut().map(|sleep| sleep.poll(cx)) {
            Some(Poll::Ready(())) => Poll::Ready(Err(TransportError::Timeout(*this.duration))),
            _ => Poll::Pending,
        }
    }
}
