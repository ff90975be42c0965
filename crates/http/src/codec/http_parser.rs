use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::LengthDecoder;
use crate::codec::header::HeaderDecoder;
use crate::codec::{ParseStatus, Parser};
use crate::protocol::{ParseError, PayloadItem, PayloadSize, RequestContext, RequestHeader};

/// Default read buffer capacity, matches a typical request head
const INIT_BUFFER_SIZE: usize = 8 * 1024;

/// The default [`Parser`]: `httparse` heads plus `Content-Length` bodies.
///
/// Parses every complete request in the buffer per call, so pipelined
/// requests arriving in one read come out as one batch. Parsing stops right
/// after a websocket upgrade request, leaving the following bytes for the
/// frame reader.
#[derive(Debug)]
pub struct HttpParser {
    buffer: BytesMut,
    header_decoder: HeaderDecoder,
    pending: Option<PendingBody>,
    contexts: Vec<RequestContext>,
}

/// A request whose head is parsed but whose body is still arriving.
#[derive(Debug)]
struct PendingBody {
    header: RequestHeader,
    decoder: LengthDecoder,
    body: BytesMut,
}

impl Default for HttpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpParser {
    pub fn new() -> Self {
        Self::with_capacity(INIT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(capacity), header_decoder: HeaderDecoder, pending: None, contexts: Vec::new() }
    }

    fn push(&mut self, header: RequestHeader, body: Bytes) {
        trace!(method = %header.method(), path = header.uri().path(), body_size = body.len(), "request ready");
        self.contexts.push(RequestContext::new(header.body(body)));
    }

    fn upgrade_pending(&self) -> bool {
        self.contexts.last().is_some_and(|ctx| ctx.request().is_websocket_upgrade())
    }
}

impl Parser for HttpParser {
    fn buffer(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    fn parse(&mut self, byte_count: usize) -> Result<ParseStatus, ParseError> {
        trace!(byte_count, buffered = self.buffer.len(), "parse request bytes");

        while !self.upgrade_pending() {
            match self.pending.take() {
                Some(mut pending) => match pending.decoder.decode(&mut self.buffer)? {
                    Some(PayloadItem::Chunk(bytes)) => {
                        pending.body.extend_from_slice(&bytes);
                        self.pending = Some(pending);
                    }
                    Some(PayloadItem::Eof) => self.push(pending.header, pending.body.freeze()),
                    None => {
                        self.pending = Some(pending);
                        break;
                    }
                },

                None => match self.header_decoder.decode(&mut self.buffer)? {
                    Some((header, PayloadSize::Length(length))) => {
                        let body = BytesMut::with_capacity(usize::try_from(length).unwrap_or(usize::MAX).min(INIT_BUFFER_SIZE));
                        self.pending = Some(PendingBody { header, decoder: LengthDecoder::new(length), body });
                    }
                    Some((header, _)) => self.push(header, Bytes::new()),
                    None => break,
                },
            }
        }

        if self.contexts.is_empty() { Ok(ParseStatus::Partial) } else { Ok(ParseStatus::Complete) }
    }

    fn take_contexts(&mut self) -> Vec<RequestContext> {
        std::mem::take(&mut self.contexts)
    }

    fn take_remaining(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    fn reset(&mut self) {
        // a pipelined request may already be half parsed, keep it
        self.contexts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use indoc::indoc;

    fn feed(parser: &mut HttpParser, bytes: &[u8]) -> Result<ParseStatus, ParseError> {
        parser.buffer().extend_from_slice(bytes);
        parser.parse(bytes.len())
    }

    #[test]
    fn pipelined_requests_in_one_read() {
        let mut parser = HttpParser::new();
        let raw = "GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\nGET /c HTTP/1.1\r\nHost: x\r\n\r\n";

        assert_eq!(feed(&mut parser, raw.as_bytes()).unwrap(), ParseStatus::Complete);

        let paths: Vec<_> = parser.take_contexts().iter().map(|ctx| ctx.request().uri().path().to_string()).collect();
        assert_eq!(paths, ["/a", "/b", "/c"]);
        assert!(parser.take_remaining().is_empty());
    }

    #[test]
    fn body_across_reads() {
        let mut parser = HttpParser::new();
        let head = indoc! {r##"
        POST /echo HTTP/1.1
        Content-Length: 10

        hello"##};

        assert_eq!(feed(&mut parser, head.as_bytes()).unwrap(), ParseStatus::Partial);
        assert_eq!(feed(&mut parser, b"world").unwrap(), ParseStatus::Complete);

        let contexts = parser.take_contexts();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].request().method(), &Method::POST);
        assert_eq!(contexts[0].request().body().as_ref(), b"helloworld");
    }

    #[test]
    fn partial_pipelined_request_survives_reset() {
        let mut parser = HttpParser::new();
        assert_eq!(feed(&mut parser, b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\nHo").unwrap(), ParseStatus::Complete);
        assert_eq!(parser.take_contexts().len(), 1);
        parser.reset();

        assert_eq!(feed(&mut parser, b"st: x\r\n\r\n").unwrap(), ParseStatus::Complete);
        assert_eq!(parser.take_contexts()[0].request().uri().path(), "/b");
    }

    #[test]
    fn stop_after_upgrade_request() {
        let mut parser = HttpParser::new();
        let mut raw = indoc! {r##"
        GET /chat HTTP/1.1
        Host: server.example.com
        Upgrade: websocket
        Connection: Upgrade
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
        Sec-WebSocket-Version: 13

        "##}
        .as_bytes()
        .to_vec();
        raw.extend_from_slice(&[0x81, 0x02, b'h', b'i']);

        assert_eq!(feed(&mut parser, &raw).unwrap(), ParseStatus::Complete);
        assert_eq!(parser.take_contexts().len(), 1);
        assert_eq!(&parser.take_remaining()[..], &[0x81, 0x02, b'h', b'i']);
    }

    #[test]
    fn malformed_input_is_an_error() {
        let mut parser = HttpParser::new();
        assert!(feed(&mut parser, b"NOT A REQUEST\x01\x02\r\n\r\n").is_err());
    }

    #[test]
    fn short_garbage_is_an_error() {
        let mut parser = HttpParser::new();
        assert_eq!(parser.parse(0).unwrap(), ParseStatus::Partial);
        assert!(matches!(feed(&mut parser, b"\x01\x02\r\n\r\n"), Err(ParseError::InvalidHeader { .. })));
    }
}
