//! A small HTTP router: method routes, middleware chains and route groups.
//!
//! See [`Router`] for the registration API and [`middleware`] for how chains compose.

mod body;
mod error;
mod fs;
mod handler;
mod request;
mod responder;
mod router;
mod server;

pub mod dispatcher;
pub mod middleware;

pub use body::Body;
pub use body::BoxError;
pub use dispatcher::Dispatcher;
pub use error::RouteError;
pub use fs::Dir;
pub use fs::File;
pub use handler::BoxHandler;
pub use handler::FnHandler;
pub use handler::Handler;
pub use handler::handler_fn;
pub use request::PathParams;
pub use request::RemoteAddr;
pub use request::Request;
pub use request::RequestExt;
pub use request::Response;
pub use responder::Responder;
pub use router::Router;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;
