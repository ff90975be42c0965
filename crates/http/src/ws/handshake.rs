//! HTTP to WebSocket upgrade helpers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use http::header::SEC_WEBSOCKET_VERSION;
use sha1::{Digest, Sha1};

use crate::ensure;
use crate::protocol::{RequestHeader, WsError};

/// Appended to the client key before hashing, fixed by RFC 6455
const WEBSOCKET_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this server speaks
const WEBSOCKET_VERSION: &[u8] = b"13";

/// Computes the `Sec-WebSocket-Accept` value for a client's `Sec-WebSocket-Key`.
///
/// ```
/// use micro_http_ws::ws::compute_accept_key;
///
/// assert_eq!(compute_accept_key(b"dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &[u8]) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key);
    sha1.update(WEBSOCKET_GUID);
    STANDARD.encode(sha1.finalize())
}

/// Validates an upgrade request and returns the accept header value to answer it with.
pub fn accept_header(header: &RequestHeader) -> Result<HeaderValue, WsError> {
    ensure!(header.is_websocket_upgrade(), WsError::invalid_handshake("not a websocket upgrade request"));

    if let Some(version) = header.headers().get(SEC_WEBSOCKET_VERSION) {
        ensure!(
            version.as_bytes() == WEBSOCKET_VERSION,
            WsError::invalid_handshake(format!("unsupported websocket version {}", String::from_utf8_lossy(version.as_bytes())))
        );
    }

    let key = header.websocket_key().ok_or_else(|| WsError::invalid_handshake("missing Sec-WebSocket-Key"))?;
    let decoded = STANDARD.decode(key.as_bytes()).map_err(WsError::invalid_handshake)?;
    ensure!(decoded.len() == 16, WsError::invalid_handshake(format!("Sec-WebSocket-Key decodes to {} bytes", decoded.len())));

    HeaderValue::from_str(&compute_accept_key(key.as_bytes())).map_err(WsError::invalid_handshake)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Version};

    fn upgrade_request(key: &str, version: &str) -> RequestHeader {
        http::Request::builder()
            .method(Method::GET)
            .uri("/chat")
            .version(Version::HTTP_11)
            .header("Upgrade", "websocket")
            .header("Connection", "Upgrade")
            .header("Sec-WebSocket-Key", key)
            .header("Sec-WebSocket-Version", version)
            .body(())
            .unwrap()
            .into()
    }

    #[test]
    fn rfc_sample_key() {
        let accept = accept_header(&upgrade_request("dGhlIHNhbXBsZSBub25jZQ==", "13")).unwrap();
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn reject_bad_handshakes() {
        assert!(accept_header(&upgrade_request("dGhlIHNhbXBsZSBub25jZQ==", "8")).is_err());
        assert!(accept_header(&upgrade_request("c2hvcnQ=", "13")).is_err());

        let plain: RequestHeader = http::Request::builder().uri("/").body(()).unwrap().into();
        assert!(matches!(accept_header(&plain), Err(WsError::InvalidHandshake { .. })));
    }
}
