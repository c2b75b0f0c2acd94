//! The listener-shaped sinks fed by the demux loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;

use crate::base::{BaseListener, SessionOf};
use crate::error::ConnectionError;
use crate::split::Shared;

/// The unit delivered on a sink's queue: a live session or a
/// connection-scoped error, never both.
pub type Envelope<S> = Result<S, ConnectionError>;

/// One of the two consumers of a [`SplitListener`](crate::SplitListener).
///
/// Behaves like a listener: blocking accept, address lookup, close. It is
/// fed exclusively by the demux loop and owns nothing but its receive
/// queue.
pub struct SinkListener<L: BaseListener> {
    shared: Arc<Shared<L>>,
    queue: Mutex<Receiver<Envelope<SessionOf<L>>>>,
}

impl<L: BaseListener> SinkListener<L> {
    pub(crate) fn new(shared: Arc<Shared<L>>, queue: Receiver<Envelope<SessionOf<L>>>) -> Self {
        Self {
            shared,
            queue: Mutex::new(queue),
        }
    }

    /// Accept the next connection delivered to this sink.
    ///
    /// Blocks until the demux loop delivers something. A delivered
    /// [`ConnectionError::Transient`] stands in for one failed connection;
    /// keep accepting after one. Once the split listener has stopped and
    /// the queue has drained, every call returns
    /// [`ConnectionError::Closed`] immediately, forever.
    ///
    /// May be called from any number of tasks concurrently; envelopes are
    /// handed out in delivery order.
    pub async fn accept(&self) -> Result<SessionOf<L>, ConnectionError> {
        match self.queue.lock().await.recv().await {
            Some(envelope) => envelope,
            None => Err(ConnectionError::Closed),
        }
    }

    /// The bound address of the base listener. A sink has no address of
    /// its own.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.base.local_addr()
    }

    /// Does nothing. Stop the owning
    /// [`SplitListener`](crate::SplitListener) instead, so both sinks and
    /// the base listener close together; a sink never closes unilaterally.
    pub fn close(&self) {}
}
