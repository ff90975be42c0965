//! Plain HTTP hello world, a chunked tick stream and a websocket echo.
//!
//! ```text
//! cargo run --example echo_server
//! curl http://127.0.0.1:8080/
//! curl http://127.0.0.1:8080/ticks
//! websocat ws://127.0.0.1:8080/ws
//! ```
//!
//! With `--features tls-rustls` and `TLS_CERT` / `TLS_KEY` pointing at PEM
//! files, connections are served over TLS instead.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use micro_http_ws::codec::HttpParser;
use micro_http_ws::connection::HttpConnection;
use micro_http_ws::handler::Handler;
use micro_http_ws::protocol::RequestContext;
use micro_http_ws::transport::{PlainTransport, Transport};
use micro_http_ws::ws::{WebSocketHandler, WebSocketSender};
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

struct Echo;

impl WebSocketHandler for Echo {
    fn on_open(&self, sender: &WebSocketSender) {
        info!("websocket session open");
        let _ = sender.send_text("welcome");
    }

    fn on_message(&self, message: Bytes, sender: &WebSocketSender) {
        if let Err(e) = sender.send_binary(message) {
            warn!(cause = %e, "can't echo message");
        }
    }

    fn on_close(&self) {
        info!("websocket session closed");
    }
}

struct Routes;

#[async_trait]
impl Handler for Routes {
    type Error = io::Error;

    async fn call(&self, ctx: &mut RequestContext) -> Result<(), Self::Error> {
        let path = ctx.request().uri().path().to_string();
        info!(path, "request");

        match path.as_str() {
            "/" => ctx.response_mut().set_body("Hello World!\r\n"),
            "/ticks" => {
                let mut stream = ctx.start_streaming().await.map_err(io::Error::other)?;
                for i in 0..5 {
                    stream.send(format!("tick {i}\n")).await.map_err(io::Error::other)?;
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                stream.finish().await.map_err(io::Error::other)?;
            }
            "/ws" => {
                if let Err(e) = ctx.accept_websocket(Echo) {
                    warn!(cause = %e, "rejecting websocket handshake");
                    ctx.response_mut().set_status(StatusCode::BAD_REQUEST);
                }
            }
            _ => {
                ctx.response_mut().set_status(StatusCode::NOT_FOUND);
                ctx.response_mut().set_body("404 not found\r\n");
            }
        }
        Ok(())
    }
}

fn serve<T: Transport>(transport: T, handler: Arc<Routes>) {
    tokio::spawn(async move {
        let connection = HttpConnection::new(transport, HttpParser::new(), handler);
        match connection.run().await {
            Ok(()) => info!("finished process, connection shutdown"),
            Err(e) => error!("service has error, cause {}, connection shutdown", e),
        }
    });
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    #[cfg(feature = "tls-rustls")]
    let tls_config = match (std::env::var("TLS_CERT"), std::env::var("TLS_KEY")) {
        (Ok(cert), Ok(key)) => match micro_http_ws::transport::load_server_config(cert, key) {
            Ok(config) => Some(config),
            Err(e) => {
                error!(cause = %e, "can't load tls configuration");
                return;
            }
        },
        _ => None,
    };

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let handler = Arc::new(Routes);
    loop {
        let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        #[cfg(feature = "tls-rustls")]
        if let Some(config) = &tls_config {
            serve(micro_http_ws::transport::TlsTransport::new(tcp_stream, config.clone()), handler.clone());
            continue;
        }

        serve(PlainTransport::new(tcp_stream), handler.clone());
    }
}
