use crate::request::{Request, Response};
use crate::responder::Responder;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Anything that can answer a request.
///
/// Handlers are shared between every in-flight request, so `call` takes `&self` and
/// implementations must be `Send + Sync`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: Request) -> Response;
}

/// A shared, type erased [`Handler`].
pub type BoxHandler = Arc<dyn Handler>;

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn call(&self, req: Request) -> Response {
        (**self).call(req).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Box<H> {
    async fn call(&self, req: Request) -> Response {
        (**self).call(req).await
    }
}

/// A holder which turns any async `Fn(Request)` into a [`Handler`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Creates a [`Handler`] from an async function or closure.
///
/// ```
/// use micro_mux::{handler_fn, Request};
///
/// let hello = handler_fn(|_req: Request| async { "hello world" });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    async fn call(&self, req: Request) -> Response {
        (self.f)(req).await.into_response()
    }
}
