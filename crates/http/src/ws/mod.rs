//! WebSocket support for upgraded connections.
//!
//! - [`FrameReader`]: reads client frames (masking, fragment reassembly)
//! - [`FrameEncoder`]: writes server frames, always final and unmasked
//! - [`WebSocketHandler`] / [`WebSocketSender`]: the application side of a
//!   session, receiving messages and queueing frames in FIFO order
//! - [`compute_accept_key`] / [`accept_header`]: the upgrade handshake

mod frame;
mod handshake;
mod mask;
mod opcode;
mod reader;
mod session;

pub use frame::{Frame, FrameEncoder};
pub use handshake::{accept_header, compute_accept_key};
pub use mask::apply_mask;
pub use opcode::OpCode;
pub use reader::{FrameEvent, FrameReader};
pub use session::{WebSocketHandler, WebSocketSender};

pub(crate) use session::{WebSocketSession, open_session};
