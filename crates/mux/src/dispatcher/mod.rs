//! Request multiplexer: maps `METHOD path` patterns to handlers and resolves a request to
//! the single most specific registration.
//!
//! # Patterns
//!
//! A pattern is `[METHOD<space|tab>]path`. Paths use [`matchit`] syntax for parameters
//! (`/users/{id}`, `/files/{*rest}`), plus two rules for trailing slashes:
//!
//! - `/api/` is a *subtree* pattern: it matches `/api/` and every path below it
//! - `/api/{$}` matches `/api/` only
//!
//! # Precedence
//!
//! 1. an exact path wins over a subtree, a longer subtree wins over a shorter one
//! 2. for the same path, a method qualified registration wins over a bare one
//! 3. a `GET` registration also answers `HEAD`
//!
//! A path that matches but not for the request method gets `405 Method Not Allowed`, a
//! path missing only its trailing slash is redirected to the subtree, anything else is
//! `404 Not Found`.

mod pattern;
mod strip_prefix;

pub use strip_prefix::{StripPrefix, strip_prefix};

use crate::body::Body;
use crate::error::RouteError;
use crate::handler::{BoxHandler, Handler};
use crate::request::{PathParams, Request, Response};
use crate::responder::content_type;
use async_trait::async_trait;
use http::{HeaderValue, Method, StatusCode};
use pattern::{Kind, Pattern};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

type Paths = matchit::Router<usize>;

/// The pattern matching multiplexer every router delegates to.
///
/// `T` is whatever is registered, [`BoxHandler`] for a dispatcher that serves requests.
pub struct Dispatcher<T = BoxHandler> {
    /// exact patterns
    paths: Paths,
    /// subtree patterns, looked up with every `/` terminated prefix of a path
    trees: Paths,
    index: HashMap<String, usize>,
    routes: Vec<Route<T>>,
}

struct Route<T> {
    exact: Endpoint<T>,
    tree: Endpoint<T>,
}

struct Endpoint<T> {
    methods: HashMap<Method, T>,
    any: Option<T>,
}

/// Outcome of resolving a request against a [`Dispatcher`].
#[derive(Debug)]
pub enum Resolved<'d, T> {
    Found(&'d T, PathParams),
    /// the path with a trailing slash (and the original query) to redirect to
    Redirect(String),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl<T> Default for Dispatcher<T> {
    fn default() -> Self {
        Self { paths: Paths::new(), trees: Paths::new(), index: HashMap::new(), routes: Vec::new() }
    }
}

impl<T> Endpoint<T> {
    fn new() -> Self {
        Self { methods: HashMap::new(), any: None }
    }

    fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.any.is_none()
    }

    fn find(&self, method: &Method) -> Option<&T> {
        self.methods
            .get(method)
            .or_else(|| if method == Method::HEAD { self.methods.get(&Method::GET) } else { None })
            .or(self.any.as_ref())
    }

    /// `None` when the slot is already taken
    fn insert(&mut self, method: Option<Method>, value: T) -> Option<&mut T> {
        match method {
            Some(method) => match self.methods.entry(method) {
                Entry::Occupied(_) => None,
                Entry::Vacant(vacant) => Some(vacant.insert(value)),
            },
            None if self.any.is_some() => None,
            None => Some(self.any.insert(value)),
        }
    }

    fn allowed(&self, allowed: &mut Vec<Method>) {
        for method in self.methods.keys() {
            if !allowed.contains(method) {
                allowed.push(method.clone());
            }
            if method == Method::GET && !allowed.contains(&Method::HEAD) {
                allowed.push(Method::HEAD);
            }
        }
    }

    fn map<U>(&self, f: &mut impl FnMut(&T) -> U) -> Endpoint<U> {
        Endpoint {
            methods: self.methods.iter().map(|(method, value)| (method.clone(), f(value))).collect(),
            any: self.any.as_ref().map(f),
        }
    }
}

impl<T> Route<T> {
    fn new() -> Self {
        Self { exact: Endpoint::new(), tree: Endpoint::new() }
    }
}

impl<T> Dispatcher<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `pattern` and hands back a reference to the stored value.
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<&mut T, RouteError> {
        let Pattern { method, path, kind } = Pattern::parse(pattern)?;
        let conflict = |source| RouteError::Conflict { pattern: pattern.to_owned(), source };

        let id = self.index.get(&path).copied().unwrap_or(self.routes.len());
        let registered = self.routes.get(id).is_some_and(|route| match kind {
            Kind::Exact => !route.exact.is_empty(),
            Kind::Subtree => !route.tree.is_empty(),
        });

        if !registered {
            let paths = match kind {
                Kind::Exact => &mut self.paths,
                Kind::Subtree => &mut self.trees,
            };
            paths.insert(path.as_str(), id).map_err(conflict)?;
        }
        if id == self.routes.len() {
            self.index.insert(path, id);
            self.routes.push(Route::new());
        }

        let route = &mut self.routes[id];
        let endpoint = match kind {
            Kind::Exact => &mut route.exact,
            Kind::Subtree => &mut route.tree,
        };
        endpoint.insert(method, value).ok_or_else(|| RouteError::Duplicate { pattern: pattern.to_owned() })
    }

    /// Finds the registration serving `method` and `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolved<'_, T> {
        let mut allowed = Vec::new();

        if let Ok(matched) = self.paths.at(path) {
            let exact = &self.routes[*matched.value].exact;
            if let Some(value) = exact.find(method) {
                return Resolved::Found(value, path_params(&matched.params));
            }
            exact.allowed(&mut allowed);
        }

        let subtree = self.enclosing_subtree(method, path, &mut allowed);

        if !path.ends_with('/')
            && let Some(location) = self.redirect(method, path)
        {
            return Resolved::Redirect(location);
        }

        match subtree {
            Some((value, params)) => Resolved::Found(value, params),
            None if !allowed.is_empty() => Resolved::MethodNotAllowed(allowed),
            None => Resolved::NotFound,
        }
    }

    /// Walks up the path looking for the closest subtree accepting `method`.
    fn enclosing_subtree(&self, method: &Method, path: &str, allowed: &mut Vec<Method>) -> Option<(&T, PathParams)> {
        for (slash, _) in path.rmatch_indices('/') {
            let Ok(matched) = self.trees.at(&path[..=slash]) else {
                continue;
            };

            let tree = &self.routes[*matched.value].tree;
            match tree.find(method) {
                Some(value) => return Some((value, path_params(&matched.params))),
                None => tree.allowed(allowed),
            }
        }
        None
    }

    /// `path/` if that is exactly a registered pattern serving `method`.
    fn redirect(&self, method: &Method, path: &str) -> Option<String> {
        let with_slash = format!("{path}/");
        let exact = self.paths.at(&with_slash).ok().and_then(|matched| self.routes[*matched.value].exact.find(method));
        let tree = || self.trees.at(&with_slash).ok().and_then(|matched| self.routes[*matched.value].tree.find(method));

        exact.or_else(tree)?;
        Some(with_slash)
    }

    /// A dispatcher with the same patterns and every registered value mapped through `f`.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Dispatcher<U> {
        Dispatcher {
            paths: self.paths.clone(),
            trees: self.trees.clone(),
            index: self.index.clone(),
            routes: self
                .routes
                .iter()
                .map(|route| Route {
                    exact: route.exact.map(&mut f),
                    tree: route.tree.map(&mut f),
                })
                .collect(),
        }
    }

    /// Number of distinct paths registered.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Dispatcher<BoxHandler> {
    /// Registers `handler` for `pattern`.
    pub fn handle(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<(), RouteError> {
        self.insert(pattern, Arc::new(handler)).map(|_| ())
    }
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut patterns = self.index.keys().collect::<Vec<_>>();
        patterns.sort();
        f.debug_struct("Dispatcher").field("paths", &patterns).finish_non_exhaustive()
    }
}

fn path_params(params: &matchit::Params<'_, '_>) -> PathParams {
    let mut path_params = PathParams::empty();
    for (key, value) in params.iter() {
        path_params.push(key, value);
    }
    path_params
}

pub(crate) fn plain_text(status: StatusCode, body: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(http::header::CONTENT_TYPE, content_type(&mime::TEXT_PLAIN_UTF_8));
    response.headers_mut().insert(http::header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

pub(crate) fn not_found() -> Response {
    plain_text(StatusCode::NOT_FOUND, "404 page not found\n")
}

fn method_not_allowed(allowed: &[Method]) -> Response {
    let mut methods = allowed.iter().map(Method::as_str).collect::<Vec<_>>();
    methods.sort_unstable();

    let mut response = plain_text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n");
    if let Ok(allow) = HeaderValue::from_str(&methods.join(", ")) {
        response.headers_mut().insert(http::header::ALLOW, allow);
    }
    response
}

pub(crate) fn moved_permanently(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(location) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
            response.headers_mut().insert(http::header::LOCATION, location);
            response
        }
        Err(_) => not_found(),
    }
}

#[async_trait]
impl Handler for Dispatcher<BoxHandler> {
    async fn call(&self, mut req: Request) -> Response {
        let resolved = self.resolve(req.method(), req.uri().path());
        match resolved {
            Resolved::Found(handler, params) => {
                if !params.is_empty() {
                    req.extensions_mut().insert(params);
                }
                handler.call(req).await
            }
            Resolved::Redirect(path) => {
                let location = match req.uri().query() {
                    Some(query) => format!("{path}?{query}"),
                    None => path,
                };
                moved_permanently(&location)
            }
            Resolved::MethodNotAllowed(allowed) => method_not_allowed(&allowed),
            Resolved::NotFound => not_found(),
        }
    }
}
