//! Request and response interceptors.
//!
//! An [`Interceptor`] is a pair of async handlers: one for a successful value and an
//! optional one for an error coming from an earlier stage. Interceptors are kept in
//! an [`InterceptorManager`], which hands out an [`InterceptorId`] per registration.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt as _;
use parking_lot::Mutex;

use crate::config::RequestConfig;
use crate::response::Response;
use crate::{BoxFuture, DebugLiteral, Error};

type Fulfilled<T> = dyn Fn(T) -> BoxFuture<'static, Result<T, Error>> + Send + Sync;
type Rejected<T> = dyn Fn(Error) -> BoxFuture<'static, Result<T, Error>> + Send + Sync;

/// A handler pair invoked at one point of the request pipeline.
pub struct Interceptor<T> {
    fulfilled: Arc<Fulfilled<T>>,
    rejected: Option<Arc<Rejected<T>>>,
}

impl<T: Send + 'static> Interceptor<T> {
    /// Intercept successful values.
    pub fn new<F, Fut>(fulfilled: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Self {
            fulfilled: Arc::new(move |value| fulfilled(value).boxed()),
            rejected: None,
        }
    }

    /// Also intercept errors from earlier stages. Returning `Ok` recovers the pipeline.
    pub fn on_rejected<F, Fut>(mut self, rejected: F) -> Self
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        self.rejected = Some(Arc::new(move |error| rejected(error).boxed()));
        self
    }

    /// Whether this interceptor can handle errors.
    pub fn handles_rejection(&self) -> bool {
        self.rejected.is_some()
    }

    /// Settle one stage: successful values go to the fulfilled handler, errors go to
    /// the rejected handler if there is one and pass through otherwise.
    pub(crate) async fn settle(&self, state: Result<T, Error>) -> Result<T, Error> {
        match state {
            Ok(value) => (self.fulfilled)(value).await,
            Err(error) => match &self.rejected {
                Some(rejected) => rejected(error).await,
                None => Err(error),
            },
        }
    }
}

impl<T> Clone for Interceptor<T> {
    fn clone(&self) -> Self {
        Self {
            fulfilled: self.fulfilled.clone(),
            rejected: self.rejected.clone(),
        }
    }
}

impl<T> fmt::Debug for Interceptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("fulfilled", &DebugLiteral("<fn>"))
            .field("rejected", &self.rejected.as_ref().map(|_| DebugLiteral("<fn>")))
            .finish()
    }
}

/// Identifies a registered interceptor. Ids are never reused within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterceptorId(u64);

#[derive(Debug)]
struct Registry<T> {
    next: u64,
    entries: BTreeMap<InterceptorId, Interceptor<T>>,
}

/// An ordered registry of interceptors.
///
/// Clones share the same registry.
pub struct InterceptorManager<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> InterceptorManager<T> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next: 0,
                entries: BTreeMap::new(),
            })),
        }
    }

    /// Register an interceptor, returning its id.
    pub fn use_interceptor(&self, interceptor: Interceptor<T>) -> InterceptorId {
        let mut registry = self.registry.lock();
        let id = InterceptorId(registry.next);
        registry.next += 1;
        registry.entries.insert(id, interceptor);
        tracing::trace!(id = id.0, "interceptor registered");
        id
    }

    /// Remove an interceptor. Unknown or already removed ids are ignored.
    pub fn eject(&self, id: InterceptorId) {
        if self.registry.lock().entries.remove(&id).is_some() {
            tracing::trace!(id = id.0, "interceptor ejected");
        }
    }

    /// Visit every registered interceptor in registration order.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(InterceptorId, &Interceptor<T>),
    {
        // The visitor may touch this registry, so run it unlocked.
        let entries: Vec<_> = self
            .registry
            .lock()
            .entries
            .iter()
            .map(|(id, interceptor)| (*id, interceptor.clone()))
            .collect();
        for (id, interceptor) in &entries {
            visitor(*id, interceptor);
        }
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    /// Whether no interceptors are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every interceptor. Ids handed out before are still never reused.
    pub fn clear(&self) {
        self.registry.lock().entries.clear();
    }
}

impl<T> Default for InterceptorManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for InterceptorManager<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<T> fmt::Debug for InterceptorManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("InterceptorManager")
            .field("ids", &registry.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The request and response interceptor registries of a client.
#[derive(Debug, Default)]
pub struct Interceptors {
    /// Run before dispatch. The most recently registered runs first.
    pub request: InterceptorManager<RequestConfig>,

    /// Run after dispatch, in registration order.
    pub response: InterceptorManager<Response>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use static_assertions::assert_impl_all;

    assert_impl_all!(Interceptor<RequestConfig>: Send, Sync, Clone);
    assert_impl_all!(InterceptorManager<Response>: Send, Sync, Clone);

    fn passthrough() -> Interceptor<RequestConfig> {
        Interceptor::new(|config| async move { Ok(config) })
    }

    fn ids(manager: &InterceptorManager<RequestConfig>) -> Vec<InterceptorId> {
        let mut ids = Vec::new();
        manager.for_each(|id, _| ids.push(id));
        ids
    }

    #[test]
    fn ids_increase() {
        let manager = InterceptorManager::new();
        let a = manager.use_interceptor(passthrough());
        let b = manager.use_interceptor(passthrough());
        assert!(a < b);
        assert_eq!(ids(&manager), vec![a, b]);
    }

    #[test]
    fn eject_removes_only_that_entry() {
        let manager = InterceptorManager::new();
        let a = manager.use_interceptor(passthrough());
        let b = manager.use_interceptor(passthrough());
        let c = manager.use_interceptor(passthrough());

        manager.eject(b);
        assert_eq!(ids(&manager), vec![a, c]);

        // Double eject is a no-op.
        manager.eject(b);
        assert_eq!(manager.len(), 2);

        let d = manager.use_interceptor(passthrough());
        assert!(d > c);
        assert_eq!(ids(&manager), vec![a, c, d]);
    }

    #[test]
    fn visitor_can_modify_the_registry() {
        let manager = InterceptorManager::new();
        let a = manager.use_interceptor(passthrough());
        let b = manager.use_interceptor(passthrough());

        let handle = manager.clone();
        let mut visited = Vec::new();
        manager.for_each(|id, _| {
            visited.push(id);
            handle.eject(id);
            let _ = format!("{handle:?}");
        });

        assert_eq!(visited, vec![a, b]);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn settle_routes_errors() {
        let recovering = Interceptor::new(|config: RequestConfig| async move { Ok(config) })
            .on_rejected(|_| async { Ok(RequestConfig::from("/recovered")) });
        let config = recovering
            .settle(Err(Error::interceptor("boom")))
            .await
            .unwrap();
        assert_eq!(config.url.as_deref(), Some("/recovered"));

        let passing = passthrough();
        assert!(!passing.handles_rejection());
        let error = passing
            .settle(Err(Error::interceptor("boom")))
            .await
            .unwrap_err();
        assert_eq!(error.message(), "boom");
    }
}
