//! The seam between admission control and the work it protects.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by a [`Handler`].
pub type HandlerFuture<Resp> = Pin<Box<dyn Future<Output = Resp> + Send + 'static>>;

/// Handler shared between callers, the queue and the drain task.
pub type SharedHandler<Req, Resp> = Arc<dyn Handler<Req, Resp>>;

/// Asynchronous request handler.
///
/// A handler failure is part of `Resp` (use a `Result` as the response type)
/// and is returned to the caller unchanged.
pub trait Handler<Req, Resp>: Send + Sync + 'static {
    /// Process one request.
    fn call(&self, request: Req) -> HandlerFuture<Resp>;
}

impl<Req, Resp, F, Fut> Handler<Req, Resp> for F
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Resp> + Send + 'static,
{
    fn call(&self, request: Req) -> HandlerFuture<Resp> {
        Box::pin((self)(request))
    }
}
