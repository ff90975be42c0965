//! HTTP head codecs.
//!
//! - [`HeaderDecoder`]: parses a request line and header fields into a
//!   [`RequestHeader`](crate::protocol::RequestHeader), enforcing the header
//!   count and size limits
//! - [`HeaderEncoder`]: serializes a response status line and headers,
//!   deriving the framing and persistence headers

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
