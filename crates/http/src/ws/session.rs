//! WebSocket session state and the outbound frame serializer.
//!
//! Outbound frames go through one FIFO shared by the frame reader (automatic
//! pongs) and every [`WebSocketSender`]. The lock only guards the queue
//! bookkeeping; the write itself runs in a spawned task that keeps the
//! connection alive through its `Arc`, and at most one such task exists at a
//! time: it is started by whoever makes the queue non-empty once the upgrade
//! response is on the wire, and it keeps draining until the queue is empty.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::codec::Encoder;
use tracing::{error, trace, warn};

use crate::connection::ConnectionShared;
use crate::protocol::WsError;
use crate::ws::{Frame, FrameEncoder};

/// Receives the events of one upgraded connection.
///
/// Callbacks run on the connection's read loop: the next frame is not read
/// until they return. Long work should be moved to a task holding a cloned
/// [`WebSocketSender`].
pub trait WebSocketHandler: Send + Sync + 'static {
    /// The upgrade response was written, frames can flow both ways.
    fn on_open(&self, sender: &WebSocketSender) {
        let _ = sender;
    }

    /// A complete, reassembled message arrived.
    fn on_message(&self, message: Bytes, sender: &WebSocketSender);

    /// Emitted once when an open session closes, whatever the reason.
    fn on_close(&self) {}
}

#[derive(Debug, Default)]
struct Outbound {
    frames: VecDeque<Frame>,
    handshake_complete: bool,
}

/// Created at most once per connection, for the first context carrying upgrade intent.
pub(crate) struct WebSocketSession {
    consumer: Arc<dyn WebSocketHandler>,
    outbound: Mutex<Outbound>,
    open: AtomicBool,
    runtime: Handle,
}

impl WebSocketSession {
    /// Must be called from within the runtime driving the connection.
    pub(crate) fn new(consumer: Arc<dyn WebSocketHandler>) -> Self {
        Self { consumer, outbound: Mutex::new(Outbound::default()), open: AtomicBool::new(false), runtime: Handle::current() }
    }

    pub(crate) fn consumer(&self) -> &dyn WebSocketHandler {
        self.consumer.as_ref()
    }

    /// Emits `on_close` if the session was opened and this is the first call.
    pub(crate) fn emit_close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.consumer.on_close();
        }
    }

    /// Returns true when the caller must start the writer.
    fn enqueue(&self, frame: Frame) -> bool {
        let mut outbound = self.outbound.lock();
        outbound.frames.push_back(frame);
        outbound.frames.len() == 1 && outbound.handshake_complete
    }

    /// Returns true when frames queued during the handshake must be flushed.
    fn complete_handshake(&self) -> bool {
        let mut outbound = self.outbound.lock();
        outbound.handshake_complete = true;
        !outbound.frames.is_empty()
    }

    fn front(&self) -> Option<Frame> {
        self.outbound.lock().frames.front().cloned()
    }

    /// Pops the frame that was just written, returns whether more are queued.
    fn pop_front(&self) -> bool {
        let mut outbound = self.outbound.lock();
        outbound.frames.pop_front();
        !outbound.frames.is_empty()
    }

    fn spawn_writer(&self, shared: Arc<ConnectionShared>) {
        self.runtime.spawn(drain_outbound(shared));
    }
}

/// Marks the upgrade handshake complete and emits `on_open`.
pub(crate) fn open_session(shared: &Arc<ConnectionShared>) {
    let Some(session) = shared.session() else {
        return;
    };
    if shared.is_closed() {
        return;
    }

    let flush = session.complete_handshake();
    session.open.store(true, Ordering::Release);
    session.consumer.on_open(&WebSocketSender::new(shared.clone()));

    if flush {
        session.spawn_writer(shared.clone());
    }
}

/// Writes queued frames one at a time until the queue is empty.
async fn drain_outbound(shared: Arc<ConnectionShared>) {
    let Some(session) = shared.session() else {
        return;
    };

    let mut encoder = FrameEncoder;
    let mut buf = BytesMut::new();
    while let Some(frame) = session.front() {
        buf.clear();
        if let Err(e) = encoder.encode(&frame, &mut buf) {
            error!(cause = %e, "can't encode websocket frame");
            shared.close();
            return;
        }

        if let Err(e) = shared.write_all(&buf).await {
            warn!(cause = %e, "websocket write failed, closing connection");
            shared.close();
            return;
        }
        trace!(opcode = ?frame.opcode(), size = buf.len(), "websocket frame written");

        if !session.pop_front() {
            return;
        }
    }
}

/// Enqueues frames on an upgraded connection, usable from any thread.
#[derive(Clone)]
pub struct WebSocketSender {
    shared: Arc<ConnectionShared>,
}

impl std::fmt::Debug for WebSocketSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSender").field("closed", &self.is_closed()).finish()
    }
}

impl WebSocketSender {
    pub(crate) fn new(shared: Arc<ConnectionShared>) -> Self {
        Self { shared }
    }

    /// Queues `frame` behind every frame sent before it.
    ///
    /// Frames go out unfragmented, fin set and unmasked.
    pub fn send(&self, frame: Frame) -> Result<(), WsError> {
        if self.shared.is_closed() {
            return Err(WsError::Closed);
        }
        let session = self.shared.session().ok_or(WsError::Closed)?;

        if session.enqueue(frame) {
            session.spawn_writer(self.shared.clone());
        }
        Ok(())
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), WsError> {
        self.send(Frame::text(text.into()))
    }

    pub fn send_binary(&self, payload: impl Into<Bytes>) -> Result<(), WsError> {
        self.send(Frame::binary(payload))
    }

    pub fn ping(&self, payload: impl Into<Bytes>) -> Result<(), WsError> {
        self.send(Frame::ping(payload))
    }

    /// Queues a close frame, the connection stays up until the peer or [`close`](Self::close) ends it.
    pub fn send_close(&self, payload: impl Into<Bytes>) -> Result<(), WsError> {
        self.send(Frame::close(payload))
    }

    /// Closes the connection, dropping frames still queued.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}
