use crate::dispatcher::not_found;
use crate::handler::{BoxHandler, Handler};
use crate::request::{Request, Response};
use async_trait::async_trait;
use http::Uri;
use http::uri::PathAndQuery;
use std::fmt;

/// Removes `prefix` from the request path before calling the wrapped handler.
///
/// The query string is kept. A request whose path does not start with `prefix` is
/// answered with `404 Not Found` without reaching the wrapped handler.
pub struct StripPrefix {
    prefix: String,
    handler: BoxHandler,
}

impl fmt::Debug for StripPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripPrefix").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}

pub fn strip_prefix(prefix: impl Into<String>, handler: BoxHandler) -> StripPrefix {
    StripPrefix { prefix: prefix.into(), handler }
}

impl StripPrefix {
    fn strip(&self, uri: &Uri) -> Option<Uri> {
        let rest = uri.path().strip_prefix(self.prefix.as_str())?;
        // an http::Uri can't carry an empty path, the mount point itself is served as "/"
        let rest = if rest.is_empty() { "/" } else { rest };

        let path_and_query = match uri.query() {
            Some(query) => PathAndQuery::try_from(format!("{rest}?{query}")),
            None => PathAndQuery::try_from(rest),
        }
        .ok()?;

        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        Uri::from_parts(parts).ok()
    }
}

#[async_trait]
impl Handler for StripPrefix {
    async fn call(&self, mut req: Request) -> Response {
        match self.strip(req.uri()) {
            Some(uri) => {
                *req.uri_mut() = uri;
                self.handler.call(req).await
            }
            None => not_found(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::strip_prefix;
    use crate::handler::{Handler, handler_fn};
    use crate::{Body, Request};
    use http::StatusCode;
    use std::sync::Arc;

    fn echo_uri() -> Arc<dyn Handler> {
        Arc::new(handler_fn(|req: Request| async move { req.uri().to_string() }))
    }

    async fn call(uri: &str) -> (StatusCode, String) {
        let handler = strip_prefix("/api", echo_uri());
        let req = http::Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = handler.call(req).await;
        let status = response.status();
        let body = response.into_body().into_bytes().await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_strips_prefix() {
        assert_eq!(call("/api/hello").await, (StatusCode::OK, "/hello".to_string()));
    }

    #[tokio::test]
    async fn test_keeps_query() {
        assert_eq!(call("/api/search?q=rust").await, (StatusCode::OK, "/search?q=rust".to_string()));
    }

    #[tokio::test]
    async fn test_exact_prefix_becomes_root() {
        assert_eq!(call("/api").await, (StatusCode::OK, "/".to_string()));
    }

    #[tokio::test]
    async fn test_missing_prefix_is_not_found() {
        let (status, _) = call("/other/hello").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
