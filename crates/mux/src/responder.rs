//! Conversion of handler return values into HTTP responses.
//!
//! [`Responder`] lets a handler return a plain string, a status code, a status/body pair
//! or a fully built [`http::Response`] and have it turned into the router's [`Response`].

use crate::body::Body;
use crate::request::Response;
use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use mime::Mime;
use std::convert::Infallible;

/// A trait for types that can be converted into HTTP responses.
pub trait Responder {
    fn into_response(self) -> Response;
}

/// `Content-Type` header value for a mime type.
pub(crate) fn content_type(mime: &Mime) -> HeaderValue {
    // a parsed mime is always a valid header value
    HeaderValue::from_str(mime.as_ref()).unwrap_or(HeaderValue::from_static("application/octet-stream"))
}

fn with_content_type(body: Body, mime: &Mime) -> Response {
    let mut response = Response::new(body);
    response.headers_mut().insert(http::header::CONTENT_TYPE, content_type(mime));
    response
}

impl Responder for Response {
    #[inline]
    fn into_response(self) -> Response {
        self
    }
}

impl Responder for http::Response<String> {
    fn into_response(self) -> Response {
        self.map(Body::from)
    }
}

impl Responder for http::Response<&'static str> {
    fn into_response(self) -> Response {
        self.map(Body::from)
    }
}

impl Responder for http::Response<Bytes> {
    fn into_response(self) -> Response {
        self.map(Body::from)
    }
}

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(t) => t.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// `None` becomes an empty `404 Not Found`.
impl<T: Responder> Responder for Option<T> {
    fn into_response(self) -> Response {
        match self {
            Some(t) => t.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn into_response(self) -> Response {
        let (status, responder) = self;
        let mut response = responder.into_response();
        *response.status_mut() = status;
        response
    }
}

impl Responder for StatusCode {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self;
        response
    }
}

impl Responder for () {
    fn into_response(self) -> Response {
        Response::new(Body::empty())
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response {
        with_content_type(Body::from(self), &mime::TEXT_PLAIN_UTF_8)
    }
}

impl Responder for String {
    fn into_response(self) -> Response {
        with_content_type(Body::from(self), &mime::TEXT_PLAIN_UTF_8)
    }
}

impl Responder for Bytes {
    fn into_response(self) -> Response {
        with_content_type(Body::from(self), &mime::APPLICATION_OCTET_STREAM)
    }
}

impl Responder for Infallible {
    fn into_response(self) -> Response {
        match self {}
    }
}
