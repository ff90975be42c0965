//! State shared between a connection's read loop and everything writing to it.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex as StagedLock;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::protocol::SendError;
use crate::ws::{WebSocketHandler, WebSocketSession};

pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Owned through `Arc` by the read loop, every spawned websocket write,
/// every [`ChunkWriter`], [`WebSocketSender`](crate::ws::WebSocketSender) and
/// [`ConnectionHandle`]. The transport's write half is released with the last one.
pub(crate) struct ConnectionShared {
    writer: Mutex<Option<BoxedWriter>>,
    staged: StagedLock<BytesMut>,
    closing: AtomicBool,
    cancel: CancellationToken,
    session: OnceLock<WebSocketSession>,
}

impl fmt::Debug for ConnectionShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionShared")
            .field("closing", &self.is_closed())
            .field("websocket", &self.session.get().is_some())
            .finish()
    }
}

impl ConnectionShared {
    pub(crate) fn new(write_buffer_size: usize) -> Self {
        Self {
            writer: Mutex::new(None),
            staged: StagedLock::new(BytesMut::with_capacity(write_buffer_size)),
            closing: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            session: OnceLock::new(),
        }
    }

    pub(crate) async fn attach_writer(&self, writer: BoxedWriter) {
        *self.writer.lock().await = Some(writer);
    }

    /// Appends an encoded response to the batch waiting for the next write.
    pub(crate) fn stage<E>(&self, encode: impl FnOnce(&mut BytesMut) -> Result<(), E>) -> Result<(), E> {
        encode(&mut self.staged.lock())
    }

    /// Writes whatever responses are staged, if any.
    pub(crate) async fn flush_staged(&self) -> io::Result<()> {
        self.write_all(&[]).await
    }

    /// Writes the staged responses followed by `bytes` as one write, or fails
    /// once the connection is closed.
    ///
    /// The writer lock is what keeps a single write in flight, staged
    /// responses always precede anything written after them.
    pub(crate) async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        let mut pending = self.staged.lock().split();
        let bytes = if pending.is_empty() {
            bytes
        } else {
            pending.extend_from_slice(bytes);
            &pending[..]
        };
        if bytes.is_empty() {
            return Ok(());
        }

        select! {
            biased;
            _ = self.cancel.cancelled() => Err(io::Error::new(io::ErrorKind::ConnectionAborted, "connection closed")),
            result = async {
                writer.write_all(bytes).await?;
                writer.flush().await
            } => result,
        }
    }

    /// Idempotent: the first call emits `on_close` for an open websocket
    /// session, then aborts every pending read and write.
    pub(crate) fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("closing connection");
        if let Some(session) = self.session.get() {
            session.emit_close();
        }
        self.cancel.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Shuts the write half down and releases it, errors are ignored.
    pub(crate) async fn shutdown(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!(cause = %e, "ignore transport shutdown error");
            }
        }
    }

    /// Binds the websocket session, only the first call succeeds.
    pub(crate) fn bind_session(&self, consumer: Arc<dyn WebSocketHandler>) -> bool {
        let bound = self.session.set(WebSocketSession::new(consumer)).is_ok();
        if bound {
            info!("websocket upgrade accepted");
        }
        bound
    }

    pub(crate) fn session(&self) -> Option<&WebSocketSession> {
        self.session.get()
    }
}

/// Writes bytes straight to the transport while a handler runs.
///
/// Used for streaming responses. Responses of earlier requests in the same
/// batch that are still staged go out first, in the same write.
#[derive(Clone)]
pub struct ChunkWriter {
    shared: Arc<ConnectionShared>,
}

impl fmt::Debug for ChunkWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkWriter").field("closed", &self.shared.is_closed()).finish()
    }
}

impl ChunkWriter {
    pub(crate) fn new(shared: Arc<ConnectionShared>) -> Self {
        Self { shared }
    }

    /// Writes `chunk` immediately. A failure is returned, the connection is left as is.
    pub async fn reply_chunk(&self, chunk: Bytes) -> Result<(), SendError> {
        if self.shared.is_closed() {
            return Err(SendError::Closed);
        }
        self.shared.write_all(&chunk).await.map_err(SendError::io)
    }
}

/// Closes a connection from outside its read loop.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    shared: Arc<ConnectionShared>,
}

impl ConnectionHandle {
    pub(crate) fn new(shared: Arc<ConnectionShared>) -> Self {
        Self { shared }
    }

    /// Safe to call any number of times, from anywhere.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn chunks_reach_the_transport() {
        let (client, server) = tokio::io::duplex(64);
        let shared = Arc::new(ConnectionShared::new(64));
        shared.attach_writer(Box::new(server)).await;

        let writer = ChunkWriter::new(shared.clone());
        writer.reply_chunk(Bytes::from_static(b"abc")).await.unwrap();
        writer.reply_chunk(Bytes::from_static(b"def")).await.unwrap();
        shared.shutdown().await;

        let mut received = Vec::new();
        let mut client = client;
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"abcdef");
    }

    #[tokio::test]
    async fn staged_responses_precede_chunks() {
        let (client, server) = tokio::io::duplex(256);
        let shared = Arc::new(ConnectionShared::new(64));
        shared.attach_writer(Box::new(server)).await;

        shared.stage(|buf| {
            buf.extend_from_slice(b"first ");
            Ok::<_, io::Error>(())
        })
        .unwrap();
        ChunkWriter::new(shared.clone()).reply_chunk(Bytes::from_static(b"second ")).await.unwrap();
        shared.stage(|buf| {
            buf.extend_from_slice(b"third");
            Ok::<_, io::Error>(())
        })
        .unwrap();
        shared.flush_staged().await.unwrap();
        shared.flush_staged().await.unwrap();
        shared.shutdown().await;

        let mut received = Vec::new();
        let mut client = client;
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"first second third");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_stops_writes() {
        let (_client, server) = tokio::io::duplex(64);
        let shared = Arc::new(ConnectionShared::new(64));
        shared.attach_writer(Box::new(server)).await;
        let handle = ConnectionHandle::new(shared.clone());

        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert!(shared.cancel_token().is_cancelled());

        let writer = ChunkWriter::new(shared);
        assert!(matches!(writer.reply_chunk(Bytes::from_static(b"late")).await, Err(SendError::Closed)));
    }
}
