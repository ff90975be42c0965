//! One request/response exchange as seen by a [`Handler`](crate::handler::Handler).

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, UPGRADE};
use http::{HeaderValue, StatusCode, Version};
use tokio_util::codec::Encoder;

use crate::codec::{ChunkedEncoder, ResponseEncoder};
use crate::connection::ChunkWriter;
use crate::ensure;
use crate::protocol::{PayloadItem, PayloadSize, Request, Response, SendError, WsError};
use crate::ws::{WebSocketHandler, accept_header};

/// A parsed request, the response being built for it, and the upgrade intent
/// the handler may leave behind.
pub struct RequestContext {
    request: Request,
    response: Response,
    websocket: Option<Arc<dyn WebSocketHandler>>,
    writer: Option<ChunkWriter>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("upgrade", &self.websocket.is_some())
            .finish()
    }
}

impl RequestContext {
    pub fn new(request: Request) -> Self {
        Self { request, response: Response::new(), websocket: None, writer: None }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Direct access to the transport, `None` outside of a running connection.
    pub fn chunk_writer(&self) -> Option<ChunkWriter> {
        self.writer.clone()
    }

    /// Records upgrade intent: once this exchange's response is written the
    /// connection switches to websocket frames delivered to `consumer`.
    ///
    /// The response itself is left to the caller, see
    /// [`accept_websocket`](Self::accept_websocket) for the usual 101.
    pub fn upgrade<W: WebSocketHandler>(&mut self, consumer: W) {
        self.websocket = Some(Arc::new(consumer));
    }

    /// Validates the upgrade request, fills the `101 Switching Protocols`
    /// response and records upgrade intent.
    ///
    /// On error nothing is changed and the handler is free to answer with a
    /// regular response.
    pub fn accept_websocket<W: WebSocketHandler>(&mut self, consumer: W) -> Result<(), WsError> {
        let accept = accept_header(self.request.header())?;

        self.response.set_status(StatusCode::SWITCHING_PROTOCOLS);
        let headers = self.response.headers_mut();
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(SEC_WEBSOCKET_ACCEPT, accept);

        self.upgrade(consumer);
        Ok(())
    }

    pub fn is_upgrade(&self) -> bool {
        self.websocket.is_some()
    }

    /// Writes the response head with chunked framing right away and returns
    /// the writer for its body.
    ///
    /// Headers must be set before calling this. The response is marked
    /// streaming so the dispatch step will not serialize it again.
    pub async fn start_streaming(&mut self) -> Result<StreamWriter, SendError> {
        let writer = self.writer.clone().ok_or(SendError::Closed)?;
        ensure!(self.request.version() == Version::HTTP_11, SendError::invalid_body("chunked streaming needs HTTP/1.1"));

        self.finish();
        self.response.set_streaming(true);

        let mut head = BytesMut::new();
        ResponseEncoder::new().encode_head(&self.response, PayloadSize::new_chunked(), &mut head)?;
        writer.reply_chunk(head.freeze()).await?;

        Ok(StreamWriter { writer, encoder: ChunkedEncoder::new(), buf: BytesMut::new() })
    }

    pub(crate) fn attach_writer(&mut self, writer: ChunkWriter) {
        self.writer = Some(writer);
    }

    pub(crate) fn take_websocket(&mut self) -> Option<Arc<dyn WebSocketHandler>> {
        self.websocket.take()
    }

    /// Aligns the response with the request once the handler is done: same
    /// protocol version, persistent only if both sides want it.
    pub(crate) fn finish(&mut self) {
        let keep_alive = self.response.keep_alive() && self.request.keep_alive();
        self.response.set_version(self.request.version());
        self.response.set_keep_alive(keep_alive);
    }
}

/// Body writer of a streaming response, each chunk is written immediately.
#[derive(Debug)]
pub struct StreamWriter {
    writer: ChunkWriter,
    encoder: ChunkedEncoder,
    buf: BytesMut,
}

impl StreamWriter {
    pub async fn send(&mut self, chunk: impl Into<Bytes>) -> Result<(), SendError> {
        self.encoder.encode(PayloadItem::Chunk(chunk.into()), &mut self.buf)?;
        self.flush().await
    }

    /// Writes the terminating chunk.
    pub async fn finish(mut self) -> Result<(), SendError> {
        self.encoder.encode(PayloadItem::<Bytes>::Eof, &mut self.buf)?;
        self.flush().await
    }

    async fn flush(&mut self) -> Result<(), SendError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let bytes = self.buf.split().freeze();
        self.writer.reply_chunk(bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestHeader;
    use http::Method;

    struct Ignore;

    impl WebSocketHandler for Ignore {
        fn on_message(&self, _message: Bytes, _sender: &crate::ws::WebSocketSender) {}
    }

    fn context(version: Version, headers: &[(&str, &str)]) -> RequestContext {
        let mut builder = http::Request::builder().method(Method::GET).uri("/chat").version(version);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let header = RequestHeader::from(builder.body(()).unwrap());
        RequestContext::new(header.body(Bytes::new()))
    }

    #[test]
    fn finish_copies_version_and_persistence() {
        let mut ctx = context(Version::HTTP_10, &[]);
        ctx.finish();
        assert_eq!(ctx.response().version(), Version::HTTP_10);
        assert!(!ctx.response().keep_alive());

        let mut ctx = context(Version::HTTP_11, &[]);
        ctx.response_mut().set_keep_alive(false);
        ctx.finish();
        assert!(!ctx.response().keep_alive());
    }

    #[test]
    fn accept_websocket_fills_101() {
        let mut ctx = context(
            Version::HTTP_11,
            &[
                ("Upgrade", "websocket"),
                ("Connection", "Upgrade"),
                ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
                ("Sec-WebSocket-Version", "13"),
            ],
        );

        ctx.accept_websocket(Ignore).unwrap();
        assert!(ctx.is_upgrade());
        assert_eq!(ctx.response().status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(ctx.response().headers().get(SEC_WEBSOCKET_ACCEPT).unwrap(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert!(ctx.take_websocket().is_some());
        assert!(!ctx.is_upgrade());
    }

    #[test]
    fn plain_request_cannot_be_accepted() {
        let mut ctx = context(Version::HTTP_11, &[]);
        assert!(ctx.accept_websocket(Ignore).is_err());
        assert!(!ctx.is_upgrade());
        assert_eq!(ctx.response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn streaming_needs_a_connection() {
        let mut ctx = context(Version::HTTP_11, &[]);
        assert!(matches!(ctx.start_streaming().await, Err(SendError::Closed)));
    }
}
