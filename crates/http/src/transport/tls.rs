//! TLS termination with rustls.

use std::fs::File;
use std::io::{self, BufReader};
use std::mem;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::debug;

use crate::transport::Transport;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("can't read {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("no certificate found in {path}")]
    NoCertificate { path: String },

    #[error("no private key found in {path}")]
    NoPrivateKey { path: String },

    #[error("invalid tls configuration: {source}")]
    Config {
        #[from]
        source: rustls::Error,
    },
}

/// Builds a server config from a PEM certificate chain and a PEM private key
/// (PKCS#8, PKCS#1 or SEC1), advertising `http/1.1` over ALPN.
pub fn load_server_config(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Arc<ServerConfig>, TlsError> {
    let certs = load_certs(cert_path.as_ref())?;
    let key = load_key(key_path.as_ref())?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Io { path: path.display().to_string(), source })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io { path: path.display().to_string(), source })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificate { path: path.display().to_string() });
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io { path: path.display().to_string(), source })?
        .ok_or_else(|| TlsError::NoPrivateKey { path: path.display().to_string() })
}

enum State<S> {
    Pending { acceptor: TlsAcceptor, stream: S },
    Established(Box<TlsStream<S>>),
    Failed,
}

/// A TLS server stream, encrypted once [`handshake`](Transport::handshake) succeeded.
///
/// Reading or writing before that fails with `NotConnected`.
pub struct TlsTransport<S> {
    state: State<S>,
}

impl<S> std::fmt::Debug for TlsTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Pending { .. } => "pending",
            State::Established(_) => "established",
            State::Failed => "failed",
        };
        f.debug_struct("TlsTransport").field("state", &state).finish()
    }
}

impl<S> TlsTransport<S> {
    pub fn new(stream: S, config: Arc<ServerConfig>) -> Self {
        Self::with_acceptor(stream, TlsAcceptor::from(config))
    }

    pub fn with_acceptor(stream: S, acceptor: TlsAcceptor) -> Self {
        Self { state: State::Pending { acceptor, stream } }
    }
}

impl<S> Transport for TlsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn handshake(&mut self) -> io::Result<()> {
        match mem::replace(&mut self.state, State::Failed) {
            State::Pending { acceptor, stream } => {
                let tls_stream = acceptor.accept(stream).await?;
                debug!(alpn = ?tls_stream.get_ref().1.alpn_protocol(), "tls handshake finished");
                self.state = State::Established(Box::new(tls_stream));
                Ok(())
            }
            State::Established(tls_stream) => {
                self.state = State::Established(tls_stream);
                Ok(())
            }
            State::Failed => Err(not_connected()),
        }
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "tls handshake not completed")
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for TlsTransport<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().state {
            State::Established(tls_stream) => Pin::new(tls_stream.as_mut()).poll_read(cx, buf),
            _ => Poll::Ready(Err(not_connected())),
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncWrite for TlsTransport<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().state {
            State::Established(tls_stream) => Pin::new(tls_stream.as_mut()).poll_write(cx, buf),
            _ => Poll::Ready(Err(not_connected())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().state {
            State::Established(tls_stream) => Pin::new(tls_stream.as_mut()).poll_flush(cx),
            _ => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().state {
            State::Established(tls_stream) => Pin::new(tls_stream.as_mut()).poll_shutdown(cx),
            _ => Poll::Ready(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pem_files() {
        let result = load_server_config("/nonexistent/cert.pem", "/nonexistent/key.pem");
        assert!(matches!(result, Err(TlsError::Io { .. })));
    }
}
