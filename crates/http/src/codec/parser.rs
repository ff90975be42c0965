//! The seam between the connection and request parsing.
//!
//! The connection owns a [`Parser`] and drives it strictly in this order:
//! read into [`Parser::buffer`], call [`Parser::parse`], and on
//! [`ParseStatus::Complete`] drain [`Parser::take_contexts`] for dispatch,
//! then [`Parser::reset`] before the next exchange.

use bytes::{Bytes, BytesMut};

use crate::protocol::{ParseError, RequestContext};

/// Outcome of feeding freshly read bytes to a [`Parser`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseStatus {
    /// At least one request context is ready for dispatch
    Complete,
    /// No complete request yet, read more bytes
    Partial,
}

pub trait Parser: Send {
    /// The buffer the next read appends into.
    fn buffer(&mut self) -> &mut BytesMut;

    /// Parses whatever is buffered after `byte_count` new bytes were appended.
    ///
    /// An `Err` means the input can never become a valid request; the
    /// connection answers it with a 400 and closes.
    fn parse(&mut self, byte_count: usize) -> Result<ParseStatus, ParseError>;

    /// Takes the ready contexts, in arrival order.
    fn take_contexts(&mut self) -> Vec<RequestContext>;

    /// Takes the buffered bytes that were not consumed by any request.
    ///
    /// After an upgrade these already belong to the websocket stream.
    fn take_remaining(&mut self) -> Bytes;

    /// Prepares for the next HTTP exchange.
    fn reset(&mut self);
}
