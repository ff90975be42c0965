use crate::codec::header::HeaderEncoder;
use crate::protocol::{PayloadSize, Response, SendError};
use bytes::BytesMut;
use tokio_util::codec::Encoder;

/// Serializes a complete, non-streaming response: head followed by its body.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Encodes only the head, announcing `payload_size` as the body framing.
    ///
    /// Used by streaming responders that push the body themselves.
    pub fn encode_head(&mut self, response: &Response, payload_size: PayloadSize, dst: &mut BytesMut) -> Result<(), SendError> {
        self.header_encoder.encode((response, payload_size), dst)
    }
}

impl<'a> Encoder<&'a Response> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, response: &'a Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if response.is_streaming() {
            return Err(SendError::invalid_body("streaming response is written through the chunk writer"));
        }

        let body = response.body();
        self.header_encoder.encode((response, PayloadSize::new_length(body.len() as u64)), dst)?;
        dst.extend_from_slice(body);
        Ok(())
    }
}
