//! HTTP request handling.
//!
//! [`RequestHeader`] wraps the parsed `http::Request<()>` head; [`Request`]
//! pairs it with the fully buffered body the parser collected.

use bytes::Bytes;
use http::header::{CONNECTION, SEC_WEBSOCKET_KEY, UPGRADE};
use http::{HeaderMap, HeaderValue, Method, Uri, Version};

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: http::Request<()>,
}

impl RequestHeader {
    /// Attaches a body to this header, converting it into a full [`Request`].
    pub fn body(self, body: Bytes) -> Request {
        Request { header: self, body }
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the client wants the connection to persist after this exchange.
    ///
    /// HTTP/1.1 persists unless `Connection: close` is present, HTTP/1.0 only
    /// persists with an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get(CONNECTION);
        match self.version() {
            Version::HTTP_11 => !connection.is_some_and(|value| has_token(value, "close")),
            _ => connection.is_some_and(|value| has_token(value, "keep-alive")),
        }
    }

    /// Whether this request asks for an HTTP to WebSocket upgrade.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.method() == Method::GET
            && self.version() == Version::HTTP_11
            && self.headers().get(UPGRADE).is_some_and(|value| has_token(value, "websocket"))
            && self.headers().get(CONNECTION).is_some_and(|value| has_token(value, "upgrade"))
    }

    /// The raw `Sec-WebSocket-Key` header, if the client sent one.
    pub fn websocket_key(&self) -> Option<&HeaderValue> {
        self.headers().get(SEC_WEBSOCKET_KEY)
    }
}

/// Checks whether a comma separated header value contains `token`, ignoring case.
fn has_token(value: &HeaderValue, token: &str) -> bool {
    value.as_bytes().split(|b| *b == b',').any(|part| part.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
}

impl From<http::Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: http::Request<()>) -> Self {
        Self { inner }
    }
}

/// A complete request: head plus the body bytes collected by the parser.
#[derive(Debug)]
pub struct Request {
    header: RequestHeader,
    body: Bytes,
}

impl Request {
    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn keep_alive(&self) -> bool {
        self.header.keep_alive()
    }

    pub fn is_websocket_upgrade(&self) -> bool {
        self.header.is_websocket_upgrade()
    }
}
