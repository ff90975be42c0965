//! Inbound frame reader.
//!
//! Each frame is read in three steps, one exact read each:
//!
//! 1. the 2-byte header: fin, opcode, mask flag and the 7-bit base length
//! 2. the extended length (0, 2 or 8 bytes) and the 4-byte mask key, in a
//!    single read, skipped when both are absent
//! 3. the payload
//!
//! Data payloads are appended to the accumulation buffer and unmasked in
//! place with an index relative to the frame, so fragments of one message
//! each restart at `mask[0]`.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::protocol::WsError;
use crate::ws::mask::apply_mask;
use crate::ws::{Frame, OpCode};

/// Upper bound on the capacity reserved up front for one payload
const PAYLOAD_RESERVE_LIMIT: u64 = 64 * 1024;

/// What one call to [`FrameReader::read_frame`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete message, opcode taken from its first fragment
    Message(Frame),
    /// A non final data fragment was buffered
    Fragment,
    Close(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Reserved(u8),
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    fin: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    length: u64,
}

#[derive(Debug)]
pub struct FrameReader {
    message: BytesMut,
    message_opcode: OpCode,
    terminated: bool,
    max_message_size: Option<usize>,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(None)
    }
}

impl FrameReader {
    pub fn new(max_message_size: Option<usize>) -> Self {
        Self { message: BytesMut::new(), message_opcode: OpCode::Binary, terminated: true, max_message_size }
    }

    /// Whether the last data fragment read had its fin bit set.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Reads exactly one frame from `reader`.
    ///
    /// Errors are terminal for the session: an io error (including a peer
    /// closing mid frame) or a message growing past the configured maximum.
    pub async fn read_frame<R>(&mut self, reader: &mut R) -> Result<FrameEvent, WsError>
    where
        R: AsyncRead + Unpin,
    {
        let header = read_header(reader).await?;
        trace!(fin = header.fin, opcode = ?header.opcode, length = header.length, masked = header.mask.is_some(), "read frame header");

        if !header.opcode.is_data() {
            self.check_size(0, header.length)?;
            let mut payload = BytesMut::new();
            read_payload(reader, &mut payload, header.length).await?;
            if let Some(mask) = header.mask {
                apply_mask(&mut payload, mask);
            }
            let payload = payload.freeze();

            return Ok(match header.opcode {
                OpCode::Close => FrameEvent::Close(payload),
                OpCode::Ping => FrameEvent::Ping(payload),
                OpCode::Pong => FrameEvent::Pong(payload),
                opcode => FrameEvent::Reserved(opcode.as_u8()),
            });
        }

        self.check_size(self.message.len(), header.length)?;
        let start = self.message.len();
        read_payload(reader, &mut self.message, header.length).await?;
        if let Some(mask) = header.mask {
            apply_mask(&mut self.message[start..], mask);
        }

        if header.opcode != OpCode::Continuation && self.terminated {
            self.message_opcode = header.opcode;
        }

        if header.fin {
            self.terminated = true;
            Ok(FrameEvent::Message(Frame::new(self.message_opcode, self.message.split().freeze())))
        } else {
            self.terminated = false;
            Ok(FrameEvent::Fragment)
        }
    }

    fn check_size(&self, buffered: usize, length: u64) -> Result<(), WsError> {
        match self.max_message_size {
            Some(max_size) => {
                // a declared 64-bit length can overflow the running total
                let size = (buffered as u64).saturating_add(length);
                if size > max_size as u64 { Err(WsError::message_too_large(size, max_size)) } else { Ok(()) }
            }
            None => Ok(()),
        }
    }
}

async fn read_header<R>(reader: &mut R) -> io::Result<FrameHeader>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; 2];
    reader.read_exact(&mut head).await?;

    let fin = head[0] & 0x80 != 0;
    let opcode = OpCode::from_u8(head[0]);
    let masked = head[1] & 0x80 != 0;
    let base_length = head[1] & 0x7F;

    let extended = match base_length {
        126 => 2,
        127 => 8,
        _ => 0,
    };
    let wanted = extended + if masked { 4 } else { 0 };

    let mut rest = [0u8; 12];
    if wanted > 0 {
        reader.read_exact(&mut rest[..wanted]).await?;
    }

    let length = match extended {
        2 => u16::from_be_bytes([rest[0], rest[1]]) as u64,
        8 => u64::from_be_bytes([rest[0], rest[1], rest[2], rest[3], rest[4], rest[5], rest[6], rest[7]]),
        _ => base_length as u64,
    };
    let mask = masked.then(|| [rest[extended], rest[extended + 1], rest[extended + 2], rest[extended + 3]]);

    Ok(FrameHeader { fin, opcode, mask, length })
}

/// Appends exactly `length` bytes from `reader` to `dst`.
///
/// The buffer grows as bytes arrive instead of trusting the declared length.
async fn read_payload<R>(reader: &mut R, dst: &mut BytesMut, length: u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    if length == 0 {
        return Ok(());
    }

    dst.reserve(length.min(PAYLOAD_RESERVE_LIMIT) as usize);
    let mut limited = reader.take(length);
    while limited.limit() > 0 {
        if limited.read_buf(dst).await? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }
    Ok(())
}
