//! HTTP/1.1 server running a [`Router`] on top of hyper.
//!
//! ```no_run
//! use micro_mux::{handler_fn, Request, Router, Server};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = Router::new();
//! router.get("/", handler_fn(|_req: Request| async { "hello world" }))?;
//!
//! let server = Server::builder().router(router).address("127.0.0.1:8080").build()?;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

use crate::body::Body;
use crate::handler::{BoxHandler, Handler};
use crate::request::RemoteAddr;
use crate::router::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::future::{self, Future};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, error, info, warn};

const DEFAULT_HEADER_READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct ServerBuilder {
    router: Option<Router>,
    address: Option<io::Result<Vec<SocketAddr>>>,
    header_read_timeout: Duration,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { router: None, address: None, header_read_timeout: DEFAULT_HEADER_READ_TIMEOUT }
    }

    /// The address to listen on, resolved right away.
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// How long a connection may take to send the headers of a request, 1 second by default.
    pub fn header_read_timeout(mut self, timeout: Duration) -> Self {
        self.header_read_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::InvalidAddress)?;
        if address.is_empty() {
            return Err(ServerBuildError::InvalidAddress(io::Error::new(
                io::ErrorKind::InvalidInput,
                "address resolved to nothing",
            )));
        }

        Ok(Server { router, address, header_read_timeout: self.header_read_timeout })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] io::Error),
}

/// Accepts connections and serves each one on its own task.
#[derive(Debug)]
pub struct Server {
    router: Router,
    address: Vec<SocketAddr>,
    header_read_timeout: Duration,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Binds the configured address and serves forever.
    pub async fn start(self) -> io::Result<()> {
        self.start_with_shutdown(future::pending()).await
    }

    /// Binds the configured address and serves until `signal` completes.
    ///
    /// Connections accepted before the signal are served to completion on their own tasks.
    pub async fn start_with_shutdown(self, signal: impl Future<Output = ()> + Send) -> io::Result<()> {
        let listener = TcpListener::bind(self.address.as_slice()).await?;
        info!(address = %listener.local_addr()?, "listening");
        self.serve(listener, signal).await
    }

    /// Serves connections from an already bound `listener` until `signal` completes.
    pub async fn serve(self, listener: TcpListener, signal: impl Future<Output = ()> + Send) -> io::Result<()> {
        let handler = self.router.handler();
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        let mut signal = std::pin::pin!(signal);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
                () = &mut signal => {
                    info!("shutting down server");
                    return Ok(());
                }
            };

            let connection = serve_connection(stream, remote_addr, Arc::clone(&handler), self.header_read_timeout);
            tokio::spawn(connection.with_subscriber(dispatch.clone()));
        }
    }
}

async fn serve_connection(stream: TcpStream, remote_addr: SocketAddr, handler: BoxHandler, header_read_timeout: Duration) {
    let service = service_fn(move |req: hyper::Request<Incoming>| {
        let handler = Arc::clone(&handler);
        async move {
            let mut req = req.map(Body::stream);
            req.extensions_mut().insert(RemoteAddr(remote_addr));
            Ok::<_, Infallible>(handler.call(req).await)
        }
    });

    let result = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(header_read_timeout)
        .serve_connection(TokioIo::new(stream), service)
        .await;

    match result {
        Ok(()) => debug!(%remote_addr, "connection closed"),
        Err(e) => warn!(%remote_addr, cause = %e, "connection closed with error"),
    }
}

impl Router {
    /// Serves this router on `address` until the process exits.
    ///
    /// Startup is logged into the router's logger; a failure to listen is logged there as
    /// well and makes `run` return.
    pub async fn run(self, address: impl ToSocketAddrs) {
        self.run_with_shutdown(address, future::pending()).await;
    }

    /// Like [`Router::run`], returning once `signal` completes.
    pub async fn run_with_shutdown(self, address: impl ToSocketAddrs, signal: impl Future<Output = ()> + Send) {
        let logger = self.logger().clone();

        async move {
            info!("Starting server");
            let server = match Server::builder().router(self).address(address).build() {
                Ok(server) => server,
                Err(e) => {
                    error!(cause = %e, "failed to start server");
                    return;
                }
            };
            if let Err(e) = server.start_with_shutdown(signal).await {
                error!(cause = %e, "failed to start server");
            }
        }
        .with_subscriber(logger)
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::{Server, ServerBuildError};
    use crate::middleware::logger::tests::LogBuffer;
    use crate::{Request, RequestExt, Router, handler_fn};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    fn router() -> Router {
        let mut router = Router::new();
        router
            .get(
                "/hello",
                handler_fn(|req: Request| async move {
                    let ip = req.remote_addr().map(|addr| addr.ip().to_string()).unwrap_or_default();
                    format!("hello {ip}")
                }),
            )
            .unwrap();
        router
    }

    async fn send(address: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(address).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_build_errors() {
        assert!(matches!(Server::builder().address("127.0.0.1:0").build(), Err(ServerBuildError::MissingRouter)));
        assert!(matches!(Server::builder().router(Router::new()).build(), Err(ServerBuildError::MissingAddress)));
        assert!(matches!(
            Server::builder().router(Router::new()).address("not an address").build(),
            Err(ServerBuildError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_build() {
        let server = Server::builder()
            .router(Router::new())
            .address("127.0.0.1:8080")
            .header_read_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(server.address, ["127.0.0.1:8080".parse::<SocketAddr>().unwrap()]);
        assert_eq!(server.header_read_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_serves_requests_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = Server::builder().router(router()).address(address).build().unwrap();

        let (shutdown, signal) = oneshot::channel::<()>();
        let serving = tokio::spawn(server.serve(listener, async {
            let _ = signal.await;
        }));

        let response = send(address, "GET /hello HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "response: {response}");
        assert!(response.ends_with("hello 127.0.0.1"), "response: {response}");

        let response = send(address, "POST /hello HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "response: {response}");

        shutdown.send(()).unwrap();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_logs_startup_failure() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = occupied.local_addr().unwrap();

        let logs = LogBuffer::default();
        Router::with_logger(logs.dispatch()).run(address).await;

        let contents = logs.contents();
        assert!(contents.contains("Starting server"), "log: {contents}");
        assert!(contents.contains("ERROR"), "log: {contents}");
        assert!(contents.contains("failed to start server"), "log: {contents}");
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let logs = LogBuffer::default();
        let (shutdown, signal) = oneshot::channel::<()>();
        let running = tokio::spawn(router_with_logger(&logs).run_with_shutdown("127.0.0.1:0", async {
            let _ = signal.await;
        }));

        shutdown.send(()).unwrap();
        running.await.unwrap();

        let contents = logs.contents();
        assert!(contents.contains("Starting server"), "log: {contents}");
        assert!(contents.contains("shutting down server"), "log: {contents}");
        assert!(!contents.contains("failed to start server"), "log: {contents}");
    }

    fn router_with_logger(logs: &LogBuffer) -> Router {
        let mut router = Router::with_logger(logs.dispatch());
        router.get("/", handler_fn(|_req: Request| async { "root" })).unwrap();
        router
    }
}
