//! HTTP response handling.
//!
//! A [`Response`] is filled by the handler and serialized by the connection
//! into the batched send buffer, unless it is flagged as streaming, in which
//! case the handler already pushed its bytes through the chunk writer.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};

/// Type alias for HTTP response headers.
///
/// `http::Response<()>` with an empty body placeholder, the body is kept
/// alongside in [`Response`].
pub type ResponseHead = http::Response<()>;

#[derive(Debug)]
pub struct Response {
    head: ResponseHead,
    body: Bytes,
    keep_alive: bool,
    streaming: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An empty `200 OK` HTTP/1.1 response that keeps the connection alive.
    pub fn new() -> Self {
        Self { head: ResponseHead::new(()), body: Bytes::new(), keep_alive: true, streaming: false }
    }

    /// A bodiless error response, always HTTP/1.1 and never persistent.
    pub fn error(status: StatusCode) -> Self {
        let mut response = Self::new();
        response.set_status(status);
        response.set_keep_alive(false);
        response
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        *self.head.status_mut() = status;
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn set_version(&mut self, version: Version) {
        *self.head.version_mut() = version;
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.head.headers_mut()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// A streaming response writes itself and contributes nothing to the batched write.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }
}
