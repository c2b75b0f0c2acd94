use thiserror::Error;

/// An error surfaced by a base listener's accept.
///
/// The variants are a closed taxonomy: callers match on the kind rather
/// than probing an error object for capabilities.
#[derive(Error, Debug)]
pub enum AcceptError {
    /// The listener has been closed. Terminal for the demux loop.
    #[error("listener closed")]
    Closed,
    /// A failure scoped to one would-be connection. The demux loop absorbs
    /// these and keeps accepting.
    #[error("retryable accept error: {0}")]
    Retryable(String),
    /// A listener-scoped failure. Terminal for the demux loop.
    #[error("fatal accept error: {0}")]
    Fatal(String),
}

/// Why a raw accepted connection could not become an established TLS
/// session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("expected tls connection but it is not")]
    NotTls,
    #[error("tls handshake resulted in error: {0}")]
    Handshake(String),
}

/// An error returned from a sink's accept.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The split listener has stopped; every accept from now on returns
    /// this.
    #[error("listener closed")]
    Closed,
    /// A connection-scoped failure delivered in place of a connection.
    /// Consumers should keep accepting; these interleave with live
    /// connections.
    #[error("transient connection error: {0}")]
    Transient(String),
}

/// The terminal error returned from [`SplitListener::start`](crate::SplitListener::start).
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The loop exited because the listener was stopped.
    #[error("listener closed")]
    Closed,
    /// `start` was called while another call already owned the loop.
    #[error("split listener already started")]
    AlreadyStarted,
    /// The loop exited on a fatal accept error.
    #[error("I/O Error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ListenerError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}
