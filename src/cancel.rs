//! Cooperative cancellation for in-flight requests.
//!
//! A [`CancelToken`] is attached to a request's configuration; the matching
//! [`Canceler`] triggers it. The first trigger stores a [`Cancel`] reason and wakes
//! every listener; later triggers do nothing.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

/// The reason a request was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message.as_deref().unwrap_or("canceled"))]
pub struct Cancel {
    message: Option<String>,
}

impl Cancel {
    /// A cancellation reason with an optional message.
    pub fn new(message: Option<String>) -> Self {
        Self { message }
    }

    /// The message given when cancelling.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[derive(Debug)]
struct Shared {
    reason: watch::Sender<Option<Cancel>>,
}

impl Shared {
    fn trigger(&self, message: Option<String>) -> bool {
        self.reason.send_if_modified(|reason| {
            if reason.is_some() {
                return false;
            }
            *reason = Some(Cancel::new(message));
            true
        })
    }
}

/// A one-shot cancellation signal, shared by the caller and the request.
///
/// Clones observe the same signal.
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelToken {
    /// Create a token, handing its [`Canceler`] to `executor`.
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Canceler),
    {
        let (reason, _) = watch::channel(None);
        let token = CancelToken {
            shared: Arc::new(Shared { reason }),
        };
        executor(Canceler {
            shared: token.shared.clone(),
        });
        token
    }

    /// Create a token together with its canceler.
    pub fn source() -> CancelTokenSource {
        let mut cancel = None;
        let token = CancelToken::new(|canceler| cancel = Some(canceler));
        let cancel = cancel.unwrap_or_else(|| Canceler {
            shared: token.shared.clone(),
        });
        CancelTokenSource { token, cancel }
    }

    /// The stored reason, once cancelled.
    pub fn reason(&self) -> Option<Cancel> {
        self.shared.reason.borrow().clone()
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.shared.reason.borrow().is_some()
    }

    /// Return the reason as an error if cancellation has been requested.
    pub fn throw_if_requested(&self) -> Result<(), Cancel> {
        match self.reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Wait until cancellation is requested, yielding the reason.
    ///
    /// Resolves immediately if the token is already cancelled.
    pub async fn cancelled(&self) -> Cancel {
        let mut receiver = self.shared.reason.subscribe();
        loop {
            if let Some(reason) = receiver.borrow_and_update().clone() {
                return reason;
            }
            if receiver.changed().await.is_err() {
                // The sender lives in `shared`, which we hold.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("reason", &self.reason())
            .finish()
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// Triggers the [`CancelToken`] it was created with.
#[derive(Clone)]
pub struct Canceler {
    shared: Arc<Shared>,
}

impl Canceler {
    /// Request cancellation. Only the first call has an effect; it returns `true`.
    pub fn cancel(&self, message: impl Into<Option<String>>) -> bool {
        let triggered = self.shared.trigger(message.into());
        if triggered {
            tracing::trace!("cancellation requested");
        }
        triggered
    }
}

impl fmt::Debug for Canceler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canceler").finish()
    }
}

/// A token and the canceler which triggers it.
#[derive(Debug, Clone)]
pub struct CancelTokenSource {
    /// Attach this to requests.
    pub token: CancelToken,

    /// Call this to cancel them.
    pub cancel: Canceler,
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use static_assertions::assert_impl_all;

    assert_impl_all!(CancelToken: Send, Sync, Clone);
    assert_impl_all!(Canceler: Send, Sync, Clone);

    #[test]
    fn reason_is_absent_until_cancelled() {
        let source = CancelToken::source();
        assert!(source.token.reason().is_none());
        assert!(source.token.throw_if_requested().is_ok());

        assert!(source.cancel.cancel(Some("Operation has been canceled.".to_owned())));
        let reason = source.token.reason().unwrap();
        assert_eq!(reason.message(), Some("Operation has been canceled."));
        assert_eq!(source.token.throw_if_requested(), Err(reason));
    }

    #[test]
    fn first_cancel_wins() {
        let source = CancelToken::source();
        assert!(source.cancel.cancel(Some("first".to_owned())));
        assert!(!source.cancel.cancel(Some("second".to_owned())));
        assert_eq!(source.token.reason().unwrap().message(), Some("first"));
    }

    #[test]
    fn executor_receives_canceler() {
        let mut canceler = None;
        let token = CancelToken::new(|c| canceler = Some(c));
        canceler.unwrap().cancel(None);
        assert!(token.is_cancelled());
        assert_eq!(token.reason().unwrap().to_string(), "canceled");
    }

    #[tokio::test]
    async fn cancelled_resolves_on_trigger() {
        let source = CancelToken::source();
        let token = source.token.clone();
        let waiter = tokio::spawn(async move { token.cancelled().await });

        tokio::time::sleep(Duration::from_millis(5)).await;
        source.cancel.cancel(Some("stop".to_owned()));

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled should resolve")
            .unwrap();
        assert_eq!(reason.message(), Some("stop"));
    }

    #[tokio::test]
    async fn cancelled_resolves_when_already_cancelled() {
        let source = CancelToken::source();
        source.cancel.cancel(None);
        assert_eq!(source.token.cancelled().await, Cancel::new(None));
    }
}
