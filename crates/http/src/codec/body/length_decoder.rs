//! Decoder for request bodies delimited by a `Content-Length` header,
//! as defined in [RFC 9112 Section 6.2](https://www.rfc-editor.org/rfc/rfc9112#section-6.2).

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Tracks the bytes still owed by a fixed-length body.
///
/// Every call hands out whatever part of the remaining body is buffered, so a
/// body split over several reads comes out as several chunks followed by `Eof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// The number of bytes remaining to be read from the payload
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    pub fn remaining(&self) -> u64 {
        self.length
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// - `Ok(Some(PayloadItem::Eof))` once the whole body has been handed out
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` for the next buffered part
    /// - `Ok(None)` when nothing is buffered yet
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.length, src.len() as u64);
        let bytes = src.split_to(len as usize).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_pipelined_bytes_alone() {
        let mut buffer: BytesMut = BytesMut::from(&b"1012345678GET / HTTP/1.1\r\n\r\n"[..]);

        let mut length_decoder = LengthDecoder::new(10);
        let payload = length_decoder.decode(&mut buffer).unwrap().unwrap();

        assert_eq!(payload.as_bytes().unwrap().as_ref(), b"1012345678");
        assert_eq!(&buffer[..], b"GET / HTTP/1.1\r\n\r\n");
        assert!(length_decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn body_split_over_reads() {
        let mut length_decoder = LengthDecoder::new(6);

        let mut buffer = BytesMut::from(&b"abcd"[..]);
        assert_eq!(length_decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap().as_ref(), b"abcd");
        assert_eq!(length_decoder.remaining(), 2);
        assert!(length_decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"ef");
        assert_eq!(length_decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap().as_ref(), b"ef");
        assert!(length_decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }
}
