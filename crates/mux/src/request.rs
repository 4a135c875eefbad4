//! Request side types shared by the router, its middleware and handlers.
//!
//! - [`PathParams`]: values captured by `{name}` and `{*rest}` segments of the matched pattern
//! - [`RemoteAddr`]: the peer address of the connection the request arrived on

use crate::body::Body;
use std::net::SocketAddr;

pub type Request = http::Request<Body>;
pub type Response = http::Response<Body>;

/// Path parameters captured by the dispatcher, stored as a request extension.
///
/// In the pattern `/users/{id}`, `id` is a path parameter. Params are inserted by the
/// dispatcher that resolved the route, so a handler inside a group sees the params of
/// the pattern it was registered with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Gets the value of a path parameter by its name
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push((key.into(), value.into()));
    }
}

/// The peer address of the connection a request was received on.
///
/// Inserted by [`Server`](crate::Server) for every request it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Convenience accessors for the extensions the router puts on a request.
pub trait RequestExt {
    /// Path parameters of the matched route, empty when the route has none.
    fn path_params(&self) -> &PathParams;

    /// A single path parameter by name.
    fn param(&self, key: &str) -> Option<&str> {
        self.path_params().get(key)
    }

    fn remote_addr(&self) -> Option<SocketAddr>;
}

impl RequestExt for Request {
    fn path_params(&self) -> &PathParams {
        static EMPTY: PathParams = PathParams { params: Vec::new() };
        self.extensions().get::<PathParams>().unwrap_or(&EMPTY)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.extensions().get::<RemoteAddr>().map(|addr| addr.0)
    }
}
