//! The base listener contract, and its production TCP+TLS implementation.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::Notify;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::error::{AcceptError, SessionError};

/// The session type a base listener's connections resolve into.
pub type SessionOf<L> = <<L as BaseListener>::Conn as IncomingConn>::Session;

/// A listener producing connections that are, or can be unwrapped as, TLS
/// sessions.
///
/// Closure must be signalled distinctly from other failures: after
/// [`close`](Self::close), pending and subsequent accepts return
/// [`AcceptError::Closed`].
#[async_trait]
pub trait BaseListener: Send + Sync + 'static {
    type Conn: IncomingConn;

    /// Accept the next raw connection.
    async fn accept(&self) -> Result<Self::Conn, AcceptError>;

    /// The bound address, if the listener has one.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Close the listener. The lifecycle controller guarantees this is
    /// invoked at most once per [`SplitListener`](crate::SplitListener).
    fn close(&self) -> io::Result<()>;
}

/// A raw connection accepted from a [`BaseListener`], not yet validated as
/// a TLS session.
#[async_trait]
pub trait IncomingConn: Send + 'static {
    type Session: Send + 'static;

    /// Resolve this connection into an established TLS session plus its
    /// negotiated ALPN protocol, performing the handshake if it has not
    /// already completed.
    ///
    /// On error the raw connection has been consumed, and with it closed;
    /// there is nothing left for the caller to clean up.
    async fn into_session(self) -> Result<(Self::Session, Option<String>), SessionError>;
}

/// Production base listener: accepts TCP connections and defers the rustls
/// handshake to [`IncomingConn::into_session`], so handshake cost and
/// failure are attributed to the demux loop rather than the acceptor.
pub struct TlsBaseListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    local_addr: Option<SocketAddr>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl TlsBaseListener {
    pub fn new(listener: TcpListener, config: Arc<rustls::ServerConfig>) -> Self {
        let local_addr = listener.local_addr().ok();
        Self {
            listener,
            acceptor: config.into(),
            local_addr,
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    pub async fn bind(addr: SocketAddr, config: Arc<rustls::ServerConfig>) -> io::Result<Self> {
        Ok(Self::new(TcpListener::bind(addr).await?, config))
    }
}

#[async_trait]
impl BaseListener for TlsBaseListener {
    type Conn = TlsIncoming;

    async fn accept(&self) -> Result<Self::Conn, AcceptError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AcceptError::Closed);
        }
        select! {
            _ = self.close_signal.notified() => Err(AcceptError::Closed),
            res = self.listener.accept() => match res {
                Ok((stream, _)) => Ok(TlsIncoming {
                    stream,
                    acceptor: self.acceptor.clone(),
                }),
                Err(e) => Err(classify_accept_error(e)),
            },
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        // notify_one stores a permit, so a pending accept wakes even if it
        // registers after this call
        self.close_signal.notify_one();
        Ok(())
    }
}

/// A TCP connection awaiting its TLS handshake.
pub struct TlsIncoming {
    stream: TcpStream,
    acceptor: TlsAcceptor,
}

#[async_trait]
impl IncomingConn for TlsIncoming {
    type Session = TlsStream<TcpStream>;

    async fn into_session(self) -> Result<(Self::Session, Option<String>), SessionError> {
        let mut tls_stream = self
            .acceptor
            .accept(self.stream)
            .await
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        // We need to flush to make sure the tls handshake has finished,
        // before the session state will be available
        tls_stream
            .flush()
            .await
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        let proto = tls_stream
            .get_ref()
            .1
            .alpn_protocol()
            .map(|p| String::from_utf8_lossy(p).into_owned());

        Ok((tls_stream, proto))
    }
}

fn classify_accept_error(e: io::Error) -> AcceptError {
    use io::ErrorKind::*;
    match e.kind() {
        // Per-connection failures: the would-be connection is gone but the
        // listening socket is fine
        ConnectionAborted | ConnectionReset | Interrupted | WouldBlock => {
            AcceptError::Retryable(e.to_string())
        }
        _ => AcceptError::Fatal(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_errors_classify_by_kind() {
        let retryable = classify_accept_error(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(matches!(retryable, AcceptError::Retryable(_)));

        let fatal = classify_accept_error(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "address gone",
        ));
        assert!(matches!(fatal, AcceptError::Fatal(_)));
    }
}
