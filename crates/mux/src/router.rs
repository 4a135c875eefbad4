//! The router: route registration, middleware chains and route groups on top of a
//! [`Dispatcher`].
//!
//! ```
//! use micro_mux::middleware::{from_fn, MiddlewareExt, Next};
//! use micro_mux::{handler_fn, Request, Router};
//!
//! # fn main() -> Result<(), micro_mux::RouteError> {
//! let mut router = Router::new();
//! router.get("/ping", handler_fn(|_req: Request| async { "pong" }))?;
//!
//! let auth = from_fn(|req: Request, next: Next| async move { next.run(req).await });
//! let api = router.group_with("/api", [auth.boxed()])?;
//! api.get("/hello", handler_fn(|_req: Request| async { "hello" }))?;
//! # Ok(())
//! # }
//! ```

use crate::dispatcher::{Dispatcher, strip_prefix};
use crate::error::RouteError;
use crate::fs;
use crate::handler::{BoxHandler, Handler};
use crate::middleware::{self, BoxMiddleware, Logger, Middleware};
use crate::request::{Request, Response};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::Dispatch;

/// Routes requests to handlers through a chain of middleware.
///
/// A router is configured through `&mut self` methods and served through `&self`, so the
/// borrow checker keeps configuration and serving apart. The chain is composed on first
/// use and recomposed after any further configuration.
pub struct Router {
    dispatcher: Dispatcher<Entry>,
    logger: Dispatch,
    middlewares: Vec<BoxMiddleware>,
    chain: OnceLock<BoxHandler>,
}

enum Entry {
    Handler(BoxHandler),
    Mount(Box<Mount>),
}

struct Mount {
    prefix: String,
    router: Router,
}

impl Entry {
    fn handler(&self) -> BoxHandler {
        match self {
            Entry::Handler(handler) => Arc::clone(handler),
            Entry::Mount(mount) => Arc::new(strip_prefix(mount.prefix.clone(), mount.router.handler())),
        }
    }
}

macro_rules! method_route {
    ($name:ident, $method:literal) => {
        #[doc = concat!("Registers `handler` for `", $method, "` requests on `pattern`.")]
        pub fn $name(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<&mut Self, RouteError> {
            self.handle(&format!(concat!($method, "\t{}"), pattern), handler)
        }
    };
}

impl Router {
    /// Creates a router which discards its log events.
    pub fn new() -> Self {
        Self::with_logger(Dispatch::none())
    }

    /// Creates a router logging into `logger`.
    ///
    /// Starts without middleware. A router built with a logger and middlewares is
    /// `Router::with_logger(logger)` followed by [`Router::wrap_all`].
    pub fn with_logger(logger: Dispatch) -> Self {
        Self { dispatcher: Dispatcher::new(), logger, middlewares: Vec::new(), chain: OnceLock::new() }
    }

    pub fn logger(&self) -> &Dispatch {
        &self.logger
    }

    /// An access log middleware writing into this router's logger.
    pub fn access_logger(&self) -> Logger {
        Logger::new(self.logger.clone())
    }

    /// Registers `handler` for a raw dispatcher pattern, e.g. `"PURGE /cache/"`.
    pub fn handle(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<&mut Self, RouteError> {
        self.chain.take();
        self.dispatcher.insert(pattern, Entry::Handler(Arc::new(handler)))?;
        Ok(self)
    }

    /// Registers `handler` for every method on `pattern`.
    ///
    /// Registrations for a specific method on the same pattern take precedence.
    pub fn all(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<&mut Self, RouteError> {
        self.handle(pattern, handler)
    }

    method_route!(get, "GET");
    method_route!(post, "POST");
    method_route!(put, "PUT");
    method_route!(patch, "PATCH");
    method_route!(delete, "DELETE");

    /// Wraps the current chain with `middleware`.
    ///
    /// The middleware applied last runs first.
    pub fn wrap(&mut self, middleware: impl Middleware) -> &mut Self {
        self.wrap_all([Arc::new(middleware) as BoxMiddleware])
    }

    /// Wraps the current chain with each middleware in order, so the last one runs first.
    pub fn wrap_all(&mut self, middlewares: impl IntoIterator<Item = BoxMiddleware>) -> &mut Self {
        self.chain.take();
        self.middlewares.extend(middlewares);
        self
    }

    /// Creates a sub-router serving every path below `prefix`.
    ///
    /// See [`Router::group_with`].
    pub fn group(&mut self, prefix: &str) -> Result<&mut Router, RouteError> {
        self.group_with(prefix, Vec::<BoxMiddleware>::new())
    }

    /// Creates a sub-router wrapped with `middlewares` and mounts it under `prefix`.
    ///
    /// Requests below `prefix` go through this router's middleware first, then through
    /// the group's, and reach the group's handlers with `prefix` removed from the path.
    /// The group shares this router's logger.
    ///
    /// # Panics
    ///
    /// Panics if any of `middlewares` is `None`.
    pub fn group_with<I>(&mut self, prefix: &str, middlewares: I) -> Result<&mut Router, RouteError>
    where
        I: IntoIterator,
        I::Item: Into<Option<BoxMiddleware>>,
    {
        let Some(middlewares) = middlewares.into_iter().map(Into::into).collect::<Option<Vec<_>>>() else {
            panic!("Router::group: middleware cannot be None");
        };

        let mut group = Router::with_logger(self.logger.clone());
        group.wrap_all(middlewares);
        self.mount(prefix, group)
    }

    /// Mounts `router` under `prefix`, stripping `prefix` from the path of the requests
    /// it receives.
    pub fn mount(&mut self, prefix: &str, router: Router) -> Result<&mut Router, RouteError> {
        if !prefix.starts_with('/') {
            return Err(RouteError::invalid(prefix, "mount prefix must start with '/'"));
        }
        if prefix.contains('{') {
            return Err(RouteError::invalid(prefix, "mount prefix must be a literal path"));
        }
        let prefix = prefix.trim_end_matches('/');

        self.chain.take();
        let mount = Mount { prefix: prefix.to_owned(), router };
        match self.dispatcher.insert(&format!("{prefix}/"), Entry::Mount(Box::new(mount)))? {
            Entry::Mount(mount) => Ok(&mut mount.router),
            Entry::Handler(_) => unreachable!("a mount was just inserted"),
        }
    }

    /// Serves the files below `dir` under `pattern`.
    pub fn static_dir(&mut self, pattern: &str, dir: impl Into<PathBuf>) -> Result<&mut Self, RouteError> {
        let pattern = if pattern.ends_with('/') { pattern.to_owned() } else { format!("{pattern}/") };
        let prefix = pattern.rsplit([' ', '\t']).next().unwrap_or_default().trim_end_matches('/').to_owned();
        let files = fs::Dir::new(dir);
        self.handle(&pattern, strip_prefix(prefix, Arc::new(files)))
    }

    /// Serves `file` for every request matching `pattern`.
    pub fn serve_file(&mut self, pattern: &str, file: impl Into<PathBuf>) -> Result<&mut Self, RouteError> {
        self.handle(pattern, fs::File::new(file))
    }

    fn chain(&self) -> &BoxHandler {
        self.chain.get_or_init(|| {
            let dispatcher: BoxHandler = Arc::new(self.dispatcher.map(Entry::handler));
            middleware::apply(dispatcher, &self.middlewares)
        })
    }

    /// The composed chain of this router.
    pub fn handler(&self) -> BoxHandler {
        Arc::clone(self.chain())
    }

    /// Serves one request through the middleware chain.
    pub async fn serve(&self, req: Request) -> Response {
        self.chain().call(req).await
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("dispatcher", &self.dispatcher)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Handler for Router {
    async fn call(&self, req: Request) -> Response {
        self.serve(req).await
    }
}
