//! Byte-stream transports a connection can run over.
//!
//! [`PlainTransport`] wraps any async stream, [`TlsTransport`] (feature
//! `tls-rustls`) terminates TLS in its handshake step. The connection driver
//! only sees the [`Transport`] trait.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

mod plain;
pub use plain::PlainTransport;

#[cfg(feature = "tls-rustls")]
mod tls;
#[cfg(feature = "tls-rustls")]
pub use tls::{TlsError, TlsTransport, load_server_config};

/// A connected byte stream with an optional handshake step.
///
/// Implement [`Transport`], the `Send` variant, which the connection requires.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport: AsyncRead + AsyncWrite + Unpin + 'static {
    /// Runs before the first read. Reads and writes are only valid after it succeeded.
    async fn handshake(&mut self) -> io::Result<()>;
}
