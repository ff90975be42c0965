//! HTTP header encoder for serializing response heads.
//!
//! Writes the status line for the response's own protocol version, the
//! handler's headers, a `connection` header reflecting persistence when the
//! version default disagrees with it, and the framing header derived from the
//! [`PayloadSize`].

use crate::FastWrite;
use crate::protocol::{PayloadSize, Response, SendError};

use bytes::{BufMut, BytesMut};

use http::{StatusCode, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl<'a> Encoder<(&'a Response, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Encodes the head of `response` into `dst`.
    ///
    /// # Errors
    ///
    /// Returns error if the response version is neither HTTP/1.0 nor HTTP/1.1.
    fn encode(&mut self, item: (&'a Response, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (response, payload_size) = item;

        let version = match response.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        let status = response.status();
        write!(FastWrite(dst), "{} {} {}\r\n", version, status.as_str(), status.canonical_reason().unwrap_or("Unknown"))?;

        // a closing response announces that itself, whatever the handler set
        let closing = !response.keep_alive();

        // framing headers are always derived from the payload, never trusted from the handler
        for (header_name, header_value) in response.headers() {
            if header_name == header::CONTENT_LENGTH || header_name == header::TRANSFER_ENCODING {
                continue;
            }
            if closing && header_name == header::CONNECTION {
                continue;
            }
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }

        if closing || !response.headers().contains_key(header::CONNECTION) {
            match (response.version(), response.keep_alive()) {
                (Version::HTTP_11, false) => dst.put_slice(b"connection: close\r\n"),
                (Version::HTTP_10, true) => dst.put_slice(b"connection: keep-alive\r\n"),
                _ => {}
            }
        }

        if has_payload_framing(status) {
            match payload_size {
                PayloadSize::Length(n) => write!(FastWrite(dst), "content-length: {n}\r\n")?,
                PayloadSize::Chunked => dst.put_slice(b"transfer-encoding: chunked\r\n"),
                PayloadSize::Empty => dst.put_slice(b"content-length: 0\r\n"),
            }
        }

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// 1xx and 204 responses must not carry content-length or transfer-encoding.
fn has_payload_framing(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn encode(response: &Response, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((response, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn error_head_is_http11_and_closes() {
        let response = Response::error(StatusCode::BAD_REQUEST);
        assert_eq!(encode(&response, PayloadSize::Empty), "HTTP/1.1 400 Bad Request\r\nconnection: close\r\ncontent-length: 0\r\n\r\n");
    }

    #[test]
    fn http10_keep_alive_is_announced() {
        let mut response = Response::new();
        response.set_version(Version::HTTP_10);
        assert_eq!(encode(&response, PayloadSize::Length(5)), "HTTP/1.0 200 OK\r\nconnection: keep-alive\r\ncontent-length: 5\r\n\r\n");
    }

    #[test]
    fn switching_protocols_has_no_framing() {
        let mut response = Response::new();
        response.set_status(StatusCode::SWITCHING_PROTOCOLS);
        response.headers_mut().insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));

        assert_eq!(
            encode(&response, PayloadSize::Empty),
            "HTTP/1.1 101 Switching Protocols\r\nupgrade: websocket\r\nconnection: Upgrade\r\n\r\n"
        );
    }

    #[test]
    fn closing_response_overrides_handler_connection_header() {
        let mut response = Response::new();
        response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        assert_eq!(encode(&response, PayloadSize::Empty), "HTTP/1.1 200 OK\r\nconnection: keep-alive\r\ncontent-length: 0\r\n\r\n");

        response.set_keep_alive(false);
        assert_eq!(encode(&response, PayloadSize::Empty), "HTTP/1.1 200 OK\r\nconnection: close\r\ncontent-length: 0\r\n\r\n");

        response.set_version(Version::HTTP_10);
        assert_eq!(encode(&response, PayloadSize::Empty), "HTTP/1.0 200 OK\r\ncontent-length: 0\r\n\r\n");
    }

    #[test]
    fn handler_framing_headers_are_replaced() {
        let mut response = Response::new();
        response.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from_static("999"));
        assert_eq!(encode(&response, PayloadSize::Chunked), "HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n");
    }

    #[test]
    fn http2_is_rejected() {
        let mut response = Response::new();
        response.set_version(Version::HTTP_2);
        let mut dst = BytesMut::new();
        assert!(matches!(HeaderEncoder.encode((&response, PayloadSize::Empty), &mut dst), Err(SendError::Io { .. })));
    }
}
