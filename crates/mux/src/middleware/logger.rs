//! Access log middleware.
//!
//! Logs one line per request: method, host, path, client address, status, elapsed time
//! and user agent, e.g.
//!
//! ```text
//! GET example.com /ping 192.0.2.1 200 31.2µs curl/8.5.0
//! ```
//!
//! Events are emitted into the [`Dispatch`] the logger was created with rather than the
//! global subscriber, so two routers with different sinks never see each other's lines.

use crate::handler::{BoxHandler, Handler};
use crate::middleware::Middleware;
use crate::request::{Request, RequestExt, Response};
use async_trait::async_trait;
use http::header::{HOST, USER_AGENT};
use http::{HeaderMap, HeaderName};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Dispatch, info};

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Logging middleware, see the [module docs](self).
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }
}

impl Middleware for Logger {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(LoggerHandler { next, dispatch: self.dispatch.clone() })
    }
}

struct LoggerHandler {
    next: BoxHandler,
    dispatch: Dispatch,
}

#[async_trait]
impl Handler for LoggerHandler {
    async fn call(&self, req: Request) -> Response {
        let now = Instant::now();

        let method = req.method().clone();
        let host = host(&req).to_owned();
        let path = req.uri().path().to_owned();
        let remote = client_addr(&req);
        let user_agent = header_str(req.headers(), &USER_AGENT).unwrap_or_default().to_owned();

        let response = self.next.call(req).await;

        let status = response.status().as_u16();
        let elapsed = now.elapsed();
        tracing::dispatcher::with_default(&self.dispatch, || {
            info!("{method} {host} {path} {remote} {status} {elapsed:?} {user_agent}");
        });

        response
    }
}

fn header_str<'r>(headers: &'r HeaderMap, name: &HeaderName) -> Option<&'r str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// The `Host` header, falling back to the authority of an absolute request uri.
fn host(req: &Request) -> &str {
    header_str(req.headers(), &HOST).or_else(|| req.uri().host()).unwrap_or_default()
}

/// A non empty `X-Forwarded-For` wins over the peer address of the connection.
fn client_addr(req: &Request) -> String {
    if let Some(forwarded) = header_str(req.headers(), &X_FORWARDED_FOR).filter(|value| !value.is_empty()) {
        return forwarded.to_owned();
    }

    req.remote_addr().map_or_else(|| "-".to_owned(), |addr| addr.ip().to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::Logger;
    use crate::handler::{BoxHandler, Handler, handler_fn};
    use crate::middleware::Middleware;
    use crate::request::RemoteAddr;
    use crate::{Body, Request};
    use http::StatusCode;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Dispatch;
    use tracing_subscriber::fmt::MakeWriter;

    /// An in memory log sink.
    #[derive(Clone, Default)]
    pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        pub(crate) fn dispatch(&self) -> Dispatch {
            let subscriber = tracing_subscriber::fmt().with_writer(self.clone()).with_ansi(false).finish();
            Dispatch::new(subscriber)
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn ping_request() -> Request {
        let mut req = http::Request::builder()
            .method("GET")
            .uri("/ping")
            .header("host", "example.com")
            .header("user-agent", "micro-test")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(RemoteAddr("192.0.2.1:1234".parse().unwrap()));
        req
    }

    fn pong() -> BoxHandler {
        Arc::new(handler_fn(|_req| async { "pong" }))
    }

    #[tokio::test]
    async fn test_logs_connection_address() {
        let logs = LogBuffer::default();
        let handler = Logger::new(logs.dispatch()).wrap(pong());

        let response = handler.call(ping_request()).await;

        assert_eq!(response.into_body().into_bytes().await.unwrap(), "pong");
        let contents = logs.contents();
        assert!(contents.contains("GET example.com /ping 192.0.2.1 200"), "unexpected log: {contents}");
        assert!(contents.contains("micro-test"), "unexpected log: {contents}");
    }

    #[tokio::test]
    async fn test_prefers_forwarded_for() {
        let logs = LogBuffer::default();
        let handler = Logger::new(logs.dispatch()).wrap(pong());

        let mut req = ping_request();
        req.headers_mut().insert("x-forwarded-for", "192.168.0.1".parse().unwrap());
        handler.call(req).await;

        let contents = logs.contents();
        assert!(contents.contains("GET example.com /ping 192.168.0.1"), "unexpected log: {contents}");
        assert!(!contents.contains("192.0.2.1"), "unexpected log: {contents}");
    }

    #[tokio::test]
    async fn test_empty_forwarded_for_is_ignored() {
        let logs = LogBuffer::default();
        let handler = Logger::new(logs.dispatch()).wrap(pong());

        let mut req = ping_request();
        req.headers_mut().insert("x-forwarded-for", "".parse().unwrap());
        handler.call(req).await;

        assert!(logs.contents().contains("GET example.com /ping 192.0.2.1"));
    }

    #[tokio::test]
    async fn test_records_status_without_altering_response() {
        let logs = LogBuffer::default();
        let teapot: BoxHandler = Arc::new(handler_fn(|_req| async { (StatusCode::IM_A_TEAPOT, "short and stout") }));
        let handler = Logger::new(logs.dispatch()).wrap(teapot);

        let response = handler.call(ping_request()).await;

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.into_body().into_bytes().await.unwrap(), "short and stout");
        assert!(logs.contents().contains("/ping 192.0.2.1 418"));
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let logs = LogBuffer::default();
        let handler = Logger::new(logs.dispatch()).wrap(pong());

        let req = http::Request::builder().uri("/ping").header("host", "example.com").body(Body::empty()).unwrap();
        handler.call(req).await;

        assert!(logs.contents().contains("GET example.com /ping - 200"));
    }
}
