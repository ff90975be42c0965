use std::error::Error;
use std::fmt;
use std::io;
use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::select;
use tokio_util::codec::Encoder;
use tracing::{error, info, trace, warn};

use crate::codec::{ParseStatus, Parser, ResponseEncoder};
use crate::config::ConnectionConfig;
use crate::connection::shared::{ChunkWriter, ConnectionHandle, ConnectionShared};
use crate::handler::Handler;
use crate::protocol::{HttpError, ParseError, Response, SendError, WsError};
use crate::transport::Transport;
use crate::ws::{Frame, FrameEvent, FrameReader, WebSocketSender, open_session};

/// Drives one accepted transport: HTTP request/response cycles, then frames
/// once a handler upgrades it to a websocket.
///
/// # Type Parameters
///
/// * `T`: the [`Transport`], plain or TLS
/// * `P`: the [`Parser`] turning bytes into request contexts
/// * `H`: the [`Handler`], shared with every other connection
pub struct HttpConnection<T, P, H> {
    transport: T,
    parser: P,
    handler: Arc<H>,
    config: ConnectionConfig,
    shared: Arc<ConnectionShared>,
}

impl<T, P, H> fmt::Debug for HttpConnection<T, P, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection").field("config", &self.config).field("shared", &self.shared).finish()
    }
}

/// Where the connection goes once the HTTP cycle stops.
enum Next {
    Close,
    Upgrade,
}

impl<T, P, H> HttpConnection<T, P, H>
where
    T: Transport,
    P: Parser,
    H: Handler,
{
    pub fn new(transport: T, parser: P, handler: Arc<H>) -> Self {
        Self::with_config(transport, parser, handler, ConnectionConfig::default())
    }

    pub fn with_config(transport: T, parser: P, handler: Arc<H>, config: ConnectionConfig) -> Self {
        Self { transport, parser, handler, shared: Arc::new(ConnectionShared::new(config.write_buffer_size())), config }
    }

    /// A handle that can close this connection while it runs.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle::new(Arc::clone(&self.shared))
    }

    /// Runs the connection until the peer leaves, a response declines
    /// keep-alive, the websocket session ends or [`ConnectionHandle::close`]
    /// is called.
    ///
    /// The transport is always shut down before this returns. A malformed
    /// request is answered with a single 400 before the error is returned.
    pub async fn run(self) -> Result<(), HttpError> {
        let HttpConnection { mut transport, parser, handler, config, shared } = self;

        let handshake = select! {
            biased;
            () = shared.cancel_token().cancelled() => None,
            handshake = transport.handshake() => Some(handshake),
        };
        let closed_early = match handshake {
            None => true,
            Some(Ok(())) => false,
            Some(Err(e)) => {
                error!(cause = %e, "transport handshake failed, closing connection");
                shared.close();
                return Err(HttpError::handshake(e));
            }
        };

        let (mut reader, writer) = tokio::io::split(transport);
        shared.attach_writer(Box::new(writer)).await;

        let result = if closed_early {
            info!("connection closed during transport handshake");
            Ok(())
        } else {
            let mut cycle = Cycle { parser, handler, shared: Arc::clone(&shared), encoder: ResponseEncoder::new(), config };

            match cycle.serve_http(&mut reader).await {
                Ok(Next::Close) => Ok(()),
                Ok(Next::Upgrade) => {
                    // bytes read past the upgrade request are already frames
                    let leftover = cycle.parser.take_remaining();
                    let mut reader = Cursor::new(leftover).chain(reader);
                    cycle.serve_websocket(&mut reader).await
                }
                Err(e) => Err(e),
            }
        };

        shared.close();
        shared.shutdown().await;
        result
    }
}

struct Cycle<P, H> {
    parser: P,
    handler: Arc<H>,
    shared: Arc<ConnectionShared>,
    config: ConnectionConfig,
    encoder: ResponseEncoder,
}

impl<P, H> Cycle<P, H>
where
    P: Parser,
    H: Handler,
{
    async fn serve_http<R>(&mut self, reader: &mut R) -> Result<Next, HttpError>
    where
        R: AsyncRead + Unpin,
    {
        // bytes left over from the previous batch are parsed before reading again
        let mut byte_count = 0;
        loop {
            match self.parser.parse(byte_count) {
                Ok(ParseStatus::Partial) => {
                    byte_count = self.read_some(reader).await?;
                    if byte_count == 0 {
                        info!("cant read more request, break this connection down");
                        return Ok(Next::Close);
                    }
                }

                Ok(ParseStatus::Complete) => {
                    byte_count = 0;
                    if let Some(next) = self.dispatch().await? {
                        return Ok(next);
                    }
                    self.parser.reset();
                }

                Err(e) => {
                    error!(cause = %e, "can't parse request, answering 400");
                    self.reply_error(StatusCode::BAD_REQUEST).await?;
                    return Err(e.into());
                }
            }
        }
    }

    /// One partial read into the parser buffer, `Ok(0)` on EOF or close.
    async fn read_some<R>(&mut self, reader: &mut R) -> Result<usize, ParseError>
    where
        R: AsyncRead + Unpin,
    {
        let buffer = self.parser.buffer();
        buffer.reserve(self.config.read_buffer_size());

        select! {
            biased;
            () = self.shared.cancel_token().cancelled() => Ok(0),
            read = reader.read_buf(buffer) => read.map_err(ParseError::io),
        }
    }

    /// Runs the handler over every ready context and writes the batch.
    ///
    /// Responses are staged on the shared state, so a streaming response
    /// flushes the ones before it ahead of its own bytes.
    /// Returns `Some` when the connection leaves the HTTP cycle after this batch.
    async fn dispatch(&mut self) -> Result<Option<Next>, HttpError> {
        let contexts = self.parser.take_contexts();
        trace!(count = contexts.len(), "dispatch request contexts");

        let mut close_after_write = false;
        let mut upgraded = false;
        let mut handler_error = None;

        for mut ctx in contexts {
            ctx.attach_writer(ChunkWriter::new(Arc::clone(&self.shared)));

            if let Err(e) = self.handler.call(&mut ctx).await {
                let cause: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %cause, "handler failed, answering 500 and closing connection");
                let encoder = &mut self.encoder;
                self.shared.stage(|buf| encoder.encode(&Response::error(StatusCode::INTERNAL_SERVER_ERROR), buf))?;
                handler_error = Some(HttpError::handler(cause));
                close_after_write = true;
                break;
            }
            ctx.finish();

            if let Some(consumer) = ctx.take_websocket() {
                if self.shared.bind_session(consumer) {
                    upgraded = true;
                } else {
                    warn!("websocket session already bound, ignoring upgrade intent");
                }
            }

            close_after_write |= !ctx.response().keep_alive();
            if !ctx.response().is_streaming() {
                let encoder = &mut self.encoder;
                self.shared.stage(|buf| encoder.encode(ctx.response(), buf))?;
            }
        }

        if let Err(e) = self.shared.flush_staged().await {
            warn!(cause = %e, "can't write responses, closing connection");
            return Err(SendError::io(e).into());
        }

        if let Some(e) = handler_error {
            return Err(e);
        }
        if close_after_write {
            info!("response declined keep-alive, closing connection");
            return Ok(Some(Next::Close));
        }
        if upgraded {
            open_session(&self.shared);
            return Ok(Some(Next::Upgrade));
        }
        Ok(None)
    }

    /// Writes a bodiless HTTP/1.1 error response that closes the connection.
    async fn reply_error(&mut self, status: StatusCode) -> Result<(), HttpError> {
        let encoder = &mut self.encoder;
        self.shared.stage(|buf| encoder.encode(&Response::error(status), buf))?;
        self.shared.flush_staged().await.map_err(SendError::io)?;
        Ok(())
    }

    async fn serve_websocket<R>(&self, reader: &mut R) -> Result<(), HttpError>
    where
        R: AsyncRead + Unpin,
    {
        let shared = Arc::clone(&self.shared);
        let Some(session) = shared.session() else {
            return Ok(());
        };
        let sender = WebSocketSender::new(Arc::clone(&shared));
        let mut frames = FrameReader::new(self.config.max_message_size());

        loop {
            let event = select! {
                biased;
                () = shared.cancel_token().cancelled() => return Ok(()),
                event = frames.read_frame(reader) => event,
            };

            match event {
                Ok(FrameEvent::Message(frame)) => {
                    trace!(opcode = ?frame.opcode(), size = frame.payload().len(), "websocket message received");
                    session.consumer().on_message(frame.into_payload(), &sender);
                }
                Ok(FrameEvent::Fragment) => {}
                Ok(FrameEvent::Close(_)) => {
                    info!("websocket close frame received, closing connection");
                    shared.close();
                    return Ok(());
                }
                Ok(FrameEvent::Ping(_)) => {
                    if sender.send(Frame::pong(Bytes::new())).is_err() {
                        return Ok(());
                    }
                }
                Ok(FrameEvent::Pong(_)) => trace!("websocket pong received"),
                Ok(FrameEvent::Reserved(opcode)) => trace!(opcode, "ignore reserved websocket opcode"),
                Err(WsError::Io { source }) if source.kind() == io::ErrorKind::UnexpectedEof => {
                    info!("peer left the websocket session");
                    return Ok(());
                }
                Err(e) => {
                    warn!(cause = %e, "websocket read failed, closing connection");
                    return Err(e.into());
                }
            }
        }
    }
}
