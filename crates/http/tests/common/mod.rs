#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use bytes::{BufMut, Bytes, BytesMut};
use micro_http_ws::codec::HttpParser;
use micro_http_ws::connection::{ConnectionHandle, HttpConnection};
use micro_http_ws::handler::Handler;
use micro_http_ws::protocol::HttpError;
use micro_http_ws::transport::Transport;
use micro_http_ws::ws::{OpCode, apply_mask};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
enum Handshake {
    Ready,
    Fail,
    Stall,
}

/// Reads what the test client writes, records every server write separately.
pub struct MockTransport {
    input: DuplexStream,
    writes: mpsc::UnboundedSender<Bytes>,
    handshake: Handshake,
    shut_down: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> (DuplexStream, Self, mpsc::UnboundedReceiver<Bytes>) {
        let (client, input) = tokio::io::duplex(64 * 1024);
        let (writes, recorded) = mpsc::unbounded_channel();
        (client, Self { input, writes, handshake: Handshake::Ready, shut_down: Arc::new(AtomicBool::new(false)) }, recorded)
    }

    pub fn failing_handshake(mut self) -> Self {
        self.handshake = Handshake::Fail;
        self
    }

    /// The handshake never completes.
    pub fn stalled_handshake(mut self) -> Self {
        self.handshake = Handshake::Stall;
        self
    }

    /// Set once the connection shut the write side down.
    pub fn shut_down(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shut_down)
    }
}

impl Transport for MockTransport {
    async fn handshake(&mut self) -> io::Result<()> {
        match self.handshake {
            Handshake::Ready => Ok(()),
            Handshake::Fail => Err(io::Error::new(io::ErrorKind::InvalidData, "bad client hello")),
            Handshake::Stall => std::future::pending().await,
        }
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.input).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.writes.send(Bytes::copy_from_slice(buf)) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(_) => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shut_down.store(true, Ordering::Release);
        Poll::Ready(Ok(()))
    }
}

pub struct Running {
    pub client: DuplexStream,
    pub writes: mpsc::UnboundedReceiver<Bytes>,
    pub handle: ConnectionHandle,
    pub task: JoinHandle<Result<(), HttpError>>,
    pub shut_down: Arc<AtomicBool>,
}

pub fn spawn_connection<H: Handler + 'static>(handler: H) -> Running {
    let (client, transport, writes) = MockTransport::new();
    let shut_down = transport.shut_down();
    let connection = HttpConnection::new(transport, HttpParser::new(), Arc::new(handler));
    let handle = connection.handle();
    let task = tokio::spawn(connection.run());
    Running { client, writes, handle, task, shut_down }
}

pub fn text(bytes: &Bytes) -> &str {
    std::str::from_utf8(bytes).unwrap()
}

/// Receives writes until `len` bytes arrived, whatever their split.
pub async fn recv_len(writes: &mut mpsc::UnboundedReceiver<Bytes>, len: usize) -> String {
    let mut received = BytesMut::new();
    while received.len() < len {
        let write = writes.recv().await.unwrap();
        received.extend_from_slice(&write);
    }
    String::from_utf8(received.to_vec()).unwrap()
}

/// A masked client frame.
pub fn client_frame(fin: bool, opcode: OpCode, payload: &[u8]) -> Vec<u8> {
    let mask = [0x11, 0x22, 0x33, 0x44];
    let mut dst = BytesMut::new();
    dst.put_u8(if fin { 0x80 } else { 0 } | opcode.as_u8());
    match payload.len() {
        len @ 0..=125 => dst.put_u8(0x80 | len as u8),
        len @ 126..=0xFFFF => {
            dst.put_u8(0x80 | 126);
            dst.put_u16(len as u16);
        }
        len => {
            dst.put_u8(0x80 | 127);
            dst.put_u64(len as u64);
        }
    }
    dst.put_slice(&mask);
    let mut body = payload.to_vec();
    apply_mask(&mut body, mask);
    dst.put_slice(&body);
    dst.to_vec()
}
