use std::future::Future;
use std::sync::Arc;

use crate::Event;

/// Error returned by a failing handler. Handlers are arbitrary module code, so
/// the bus does not constrain the error type.
pub type HandlerError = anyhow::Error;

/// A subscriber capability: reacts to one delivered event.
///
/// Failures (returned errors or panics) are isolated by the bus: they are
/// logged and reported, never propagated to the emitter or sibling handlers.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<(), HandlerError>;
}

/// Closure adapter: any `Fn(Event) -> impl Future<Output = Result<(), HandlerError>>`.
#[async_trait::async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        (self)(event).await
    }
}

/// Shared handle to a handler. Registration identity is the allocation this
/// points to: register the same `SharedHandler` (or a clone of it) to get
/// idempotent subscribe/unsubscribe.
pub type SharedHandler = Arc<dyn EventHandler>;

/// Wrap a closure into a [`SharedHandler`].
pub fn handler_fn<F, Fut>(f: F) -> SharedHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(f)
}

/// Identity of a shared handler (data pointer; vtable ignored).
pub(crate) fn handler_identity(handler: &SharedHandler) -> *const () {
    Arc::as_ptr(handler) as *const ()
}
