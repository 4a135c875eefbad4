#[cfg(feature = "codspeed")]
pub use codspeed_criterion_compat as criterion;
#[cfg(not(feature = "codspeed"))]
pub use criterion;

use http::{HeaderName, HeaderValue, Uri};
use micro_mux::middleware::{BoxMiddleware, MiddlewareExt, Next, from_fn};
use micro_mux::{Body, Handler, Request, handler_fn};

/// A handler answering `ok`.
pub fn dummy_handler() -> impl Handler {
    handler_fn(|_req: Request| async { "ok" })
}

/// A middleware setting `X-{tag}: true` before calling the rest of the chain.
///
/// # Panics
///
/// Panics when `x-{tag}` is not a valid header name.
pub fn make_middleware(tag: &'static str) -> BoxMiddleware {
    let name = HeaderName::try_from(format!("x-{tag}")).expect("tag should form a valid header name");
    from_fn(move |mut req: Request, next: Next| {
        req.headers_mut().insert(name.clone(), HeaderValue::from_static("true"));
        next.run(req)
    })
    .boxed()
}

pub fn request(uri: &'static str) -> Request {
    let mut req = Request::new(Body::empty());
    *req.uri_mut() = Uri::from_static(uri);
    req
}
