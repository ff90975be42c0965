//! HTTP body codecs.
//!
//! - [`LengthDecoder`]: collects a `Content-Length` delimited request body
//! - [`ChunkedEncoder`]: frames streaming response bodies with chunked
//!   transfer encoding

mod chunked_encoder;
mod length_decoder;

pub use chunked_encoder::ChunkedEncoder;
pub use length_decoder::LengthDecoder;
