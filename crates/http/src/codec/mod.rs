//! HTTP codecs and the request parser seam.
//!
//! - [`Parser`] / [`ParseStatus`]: the interface the connection drives
//! - [`HttpParser`]: the default parser, built from the head decoder and the
//!   content-length body decoder
//! - [`ResponseEncoder`]: serializes non-streaming responses into the batched
//!   send buffer
//! - [`ChunkedEncoder`]: chunked framing for streaming responses

mod body;
mod header;
mod http_parser;
mod parser;
mod response_encoder;

pub use body::ChunkedEncoder;
pub use header::{HeaderDecoder, HeaderEncoder};
pub use http_parser::HttpParser;
pub use parser::{ParseStatus, Parser};
pub use response_encoder::ResponseEncoder;
