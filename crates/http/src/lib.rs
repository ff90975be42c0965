//! A per-connection HTTP/1.x and WebSocket engine on tokio.
//!
//! One [`HttpConnection`](connection::HttpConnection) drives one accepted
//! transport through two modes:
//!
//! 1. HTTP: read, parse every pipelined request in the buffer, call the
//!    [`Handler`](handler::Handler) once per request in arrival order, write
//!    all responses in a single write, then keep the connection alive or
//!    close it.
//! 2. WebSocket: after a handler accepted an upgrade, read frames (masking,
//!    fragment reassembly, automatic pongs) and deliver messages to a
//!    [`WebSocketHandler`](ws::WebSocketHandler), while outbound frames are
//!    written strictly in FIFO order, one write at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use micro_http_ws::codec::HttpParser;
//! use micro_http_ws::connection::HttpConnection;
//! use micro_http_ws::handler::make_handler;
//! use micro_http_ws::protocol::{RequestContext, WsError};
//! use micro_http_ws::transport::PlainTransport;
//! use micro_http_ws::ws::{WebSocketHandler, WebSocketSender};
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! struct Echo;
//!
//! impl WebSocketHandler for Echo {
//!     fn on_message(&self, message: Bytes, sender: &WebSocketSender) {
//!         let _ = sender.send_binary(message);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(|ctx: &mut RequestContext| {
//!         Box::pin(async move {
//!             if ctx.request().is_websocket_upgrade() {
//!                 return ctx.accept_websocket(Echo);
//!             }
//!             ctx.response_mut().set_body("Hello World!\r\n");
//!             Ok::<_, WsError>(())
//!         })
//!     }));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let connection = HttpConnection::new(PlainTransport::new(tcp_stream), HttpParser::new(), handler.clone());
//!         tokio::spawn(async move {
//!             match connection.run().await {
//!                 Ok(()) => info!("finished process, connection shutdown"),
//!                 Err(e) => error!("service has error, cause {}, connection shutdown", e),
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`transport`]: plain and TLS byte streams behind one trait
//! - [`codec`]: the parser seam, the default `httparse` based parser and the
//!   response encoders
//! - [`protocol`]: requests, responses, the per-exchange context and errors
//! - [`handler`]: the request handler trait and [`make_handler`](handler::make_handler)
//! - [`connection`]: the per-connection actor
//! - [`ws`]: frame reading and writing, the session and the upgrade handshake
//! - [`config`]: buffer sizes and the optional websocket message limit
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - Request bodies must use `Content-Length`, chunked uploads get a 400
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod transport;
pub mod ws;

mod utils;
pub(crate) use utils::{FastWrite, ensure};
