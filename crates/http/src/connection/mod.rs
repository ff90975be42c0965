//! Per-connection actor.
//!
//! - [`HttpConnection`]: reads, parses and dispatches pipelined requests,
//!   batches their responses into one write, honours keep-alive and switches
//!   to websocket frames after an upgrade
//! - [`ChunkWriter`]: immediate writes for streaming responses
//! - [`ConnectionHandle`]: closes a running connection from elsewhere
//!
//! Everything that may outlive a single `.await` of the read loop (spawned
//! websocket writes, senders, chunk writers, handles) holds the connection's
//! shared state through an `Arc`, so it is released only after the last of
//! them completes.

mod http_connection;
mod shared;

pub use http_connection::HttpConnection;
pub use shared::{ChunkWriter, ConnectionHandle};

pub(crate) use shared::ConnectionShared;
