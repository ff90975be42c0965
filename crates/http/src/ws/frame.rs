//! Server side frame encoding.
//!
//! Wire layout written by [`FrameEncoder`]:
//!
//! ```text
//! byte 0      0x80 | opcode          fin always set
//! byte 1      length, never masked   0..=125 literal, 126 => u16 BE, 127 => u64 BE
//! byte 2..    extended length (0, 2 or 8 bytes)
//! ...         payload verbatim
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::WsError;
use crate::ws::OpCode;

/// Largest payload length encoded in the length byte itself
const MAX_LITERAL_LENGTH: usize = 125;

/// Sentinel announcing a 16-bit extended length
const LENGTH_16_SENTINEL: u8 = 126;

/// Sentinel announcing a 64-bit extended length
const LENGTH_64_SENTINEL: u8 = 127;

/// One unfragmented websocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: OpCode,
    payload: Bytes,
}

impl Frame {
    pub fn new(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self { opcode, payload: payload.into() }
    }

    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Text, payload)
    }

    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Binary, payload)
    }

    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Ping, payload)
    }

    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Pong, payload)
    }

    pub fn close(payload: impl Into<Bytes>) -> Self {
        Self::new(OpCode::Close, payload)
    }

    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Header plus payload size on the wire.
    pub fn encoded_len(&self) -> usize {
        let extended = match self.payload.len() {
            0..=MAX_LITERAL_LENGTH => 0,
            126..=0xFFFF => 2,
            _ => 8,
        };
        2 + extended + self.payload.len()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameEncoder;

impl Encoder<Frame> for FrameEncoder {
    type Error = WsError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&Frame>>::encode(self, &frame, dst)
    }
}

impl Encoder<&Frame> for FrameEncoder {
    type Error = WsError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let length = frame.payload.len();
        dst.reserve(frame.encoded_len());

        dst.put_u8(0x80 | frame.opcode.as_u8());
        match length {
            0..=MAX_LITERAL_LENGTH => dst.put_u8(length as u8),
            126..=0xFFFF => {
                dst.put_u8(LENGTH_16_SENTINEL);
                dst.put_u16(length as u16);
            }
            _ => {
                dst.put_u8(LENGTH_64_SENTINEL);
                dst.put_u64(length as u64);
            }
        }
        dst.put_slice(&frame.payload);
        Ok(())
    }
}
