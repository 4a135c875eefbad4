//! Middleware: functions that wrap a [`Handler`] into another handler.
//!
//! A [`Middleware`] receives the handler it wraps and returns the new one. Wrapping is
//! the only composition primitive: applying `m1` then `m2` to a handler `h` yields
//! `m2(m1(h))`, so the middleware applied last is the outermost one and sees the
//! request first.
//!
//! The easiest way to write one is [`from_fn`]:
//!
//! ```
//! use micro_mux::middleware::{from_fn, Next};
//! use micro_mux::Request;
//!
//! let tag = from_fn(|mut req: Request, next: Next| async move {
//!     req.headers_mut().insert("x-tagged", "true".parse().unwrap());
//!     next.run(req).await
//! });
//! ```

pub(crate) mod logger;

pub use logger::Logger;

use crate::handler::{BoxHandler, Handler};
use crate::request::{Request, Response};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Wraps a handler into another handler.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxHandler) -> BoxHandler;
}

/// A shared, type erased [`Middleware`].
pub type BoxMiddleware = Arc<dyn Middleware>;

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        (**self).wrap(next)
    }
}

pub trait MiddlewareExt: Middleware + Sized {
    /// Erases the middleware type so it can be stored next to others.
    fn boxed(self) -> BoxMiddleware {
        Arc::new(self)
    }

    /// Composes two middleware into one, the argument wraps last and so runs first.
    fn and_then<M: Middleware>(self, middleware: M) -> Stack<Self, M> {
        Stack { inner: self, outer: middleware }
    }
}

impl<M: Middleware> MiddlewareExt for M {}

/// Folds `middlewares` around `handler` in order, each one wrapping the result so far.
pub fn apply<'a, I>(handler: BoxHandler, middlewares: I) -> BoxHandler
where
    I: IntoIterator<Item = &'a BoxMiddleware>,
{
    middlewares.into_iter().fold(handler, |next, middleware| middleware.wrap(next))
}

/// Two middleware applied one after the other, see [`MiddlewareExt::and_then`].
#[derive(Debug, Clone)]
pub struct Stack<Inner, Outer> {
    inner: Inner,
    outer: Outer,
}

impl<Inner: Middleware, Outer: Middleware> Middleware for Stack<Inner, Outer> {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        self.outer.wrap(self.inner.wrap(next))
    }
}

/// The rest of the chain, handed to a [`from_fn`] middleware.
#[derive(Clone)]
pub struct Next {
    handler: BoxHandler,
}

impl Next {
    /// Runs the wrapped handler.
    pub async fn run(self, req: Request) -> Response {
        self.handler.call(req).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// A middleware built from an async function, see [`from_fn`].
pub struct FromFn<F> {
    f: Arc<F>,
}

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

/// Creates a middleware from an async `Fn(Request, Next) -> Response`.
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send,
{
    FromFn { f: Arc::new(f) }
}

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send,
{
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(FromFnHandler { f: Arc::clone(&self.f), next })
    }
}

struct FromFnHandler<F> {
    f: Arc<F>,
    next: BoxHandler,
}

#[async_trait]
impl<F, Fut> Handler for FromFnHandler<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send,
{
    async fn call(&self, req: Request) -> Response {
        let next = Next { handler: Arc::clone(&self.next) };
        (self.f)(req, next).await
    }
}
