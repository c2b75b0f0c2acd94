//! The split listener: demux loop and stop lifecycle.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{channel, Sender};

use crate::base::{BaseListener, IncomingConn, SessionOf, TlsBaseListener};
use crate::error::{AcceptError, ConnectionError, ListenerError};
use crate::proto::{classify, ProtoClass, ProtoRegistry};
use crate::sink::{Envelope, SinkListener};

/// The split listener most embedders want: TCP+rustls base listener with
/// the library's own protocol registry.
pub type TlsSplitListener = SplitListener<TlsBaseListener, nodetrust_types::KnownProtos>;

/// State shared between the split listener and its sinks.
pub(crate) struct Shared<L: BaseListener> {
    pub(crate) base: L,
    stopped: AtomicBool,
}

/// The sending halves of both sink queues. Held by `start` for exactly the
/// lifetime of the loop; dropping them is what closes the queues.
struct Producers<L: BaseListener> {
    node: Sender<Envelope<SessionOf<L>>>,
    other: Sender<Envelope<SessionOf<L>>>,
}

/// Routes connections from one base listener to two listener-shaped sinks
/// by negotiated ALPN protocol.
///
/// Exactly one call to [`start`](Self::start) runs the demux loop;
/// [`stop`](Self::stop) may be called from anywhere, any number of times.
/// Delivery to a sink blocks until its consumer accepts, so a sink whose
/// consumer never accepts eventually stalls acceptance for both sinks.
/// That trade-off keeps the loop free of buffering and is deliberate.
pub struct SplitListener<L: BaseListener, R: ProtoRegistry> {
    shared: Arc<Shared<L>>,
    registry: R,
    producers: Mutex<Option<Producers<L>>>,
    node: Arc<SinkListener<L>>,
    other: Arc<SinkListener<L>>,
}

impl<L: BaseListener, R: ProtoRegistry> SplitListener<L, R> {
    /// Wrap a base listener. Both sinks and their queues are created here,
    /// once, and live for the lifetime of the split listener.
    pub fn new(base: L, registry: R) -> Self {
        let shared = Arc::new(Shared {
            base,
            stopped: AtomicBool::new(false),
        });
        let (node_send, node_recv) = channel(1);
        let (other_send, other_recv) = channel(1);
        Self {
            node: Arc::new(SinkListener::new(shared.clone(), node_recv)),
            other: Arc::new(SinkListener::new(shared.clone(), other_recv)),
            shared,
            registry,
            producers: Mutex::new(Some(Producers {
                node: node_send,
                other: other_send,
            })),
        }
    }

    /// The sink receiving authenticated-node connections. Hand this to the
    /// embedding transport/RPC server.
    pub fn node_listener(&self) -> Arc<SinkListener<L>> {
        self.node.clone()
    }

    /// The sink receiving every other connection, and every delivered
    /// connection error.
    pub fn other_listener(&self) -> Arc<SinkListener<L>> {
        self.other.clone()
    }

    /// Run the demux loop until it terminates, blocking the caller and
    /// returning the terminal error: [`ListenerError::Closed`] after
    /// [`stop`](Self::stop), or the fatal accept error otherwise. Both
    /// sink queues are closed, exactly once, before this returns.
    pub async fn start(&self) -> ListenerError {
        let producers = match self.producers.lock().expect("producer slot poisoned").take() {
            Some(producers) => producers,
            None => return ListenerError::AlreadyStarted,
        };

        let err = self.run(&producers).await;

        if !matches!(err, ListenerError::Closed) {
            // Fatal exit: mark the listener stopped so a later stop() does
            // not close the already-unusable base listener a second time
            let _ = self.shared.stopped.compare_exchange(
                false,
                true,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }

        // Dropping the senders closes both queues; the loop has
        // permanently exited by this point
        drop(producers);
        err
    }

    async fn run(&self, producers: &Producers<L>) -> ListenerError {
        loop {
            if self.shared.stopped.load(Ordering::Acquire) {
                return ListenerError::Closed;
            }

            let conn = match self.shared.base.accept().await {
                Ok(conn) => conn,
                Err(AcceptError::Closed) => return ListenerError::Closed,
                Err(AcceptError::Retryable(msg)) => {
                    tracing::debug!("retryable accept error: {}", msg);
                    continue;
                }
                Err(AcceptError::Fatal(msg)) => return ListenerError::IoError(msg),
            };

            let (session, proto) = match conn.into_session().await {
                Ok(established) => established,
                Err(e) => {
                    // Without an established session we can't know which
                    // proto; the raw connection was consumed (and so
                    // closed) by into_session
                    deliver(&producers.other, Err(ConnectionError::Transient(e.to_string())))
                        .await;
                    continue;
                }
            };

            match classify(&self.registry, proto.as_deref()) {
                ProtoClass::Authenticate => {
                    // The only case where a live connection reaches the
                    // node sink: it has fully authenticated
                    deliver(&producers.node, Ok(session)).await;
                }
                ProtoClass::Unknown => {
                    deliver(&producers.other, Ok(session)).await;
                }
                ProtoClass::HandshakeOnly => {
                    // The handshake was all this proto needed; close the
                    // connection and deliver nothing
                    drop(session);
                }
            }
        }
    }

    /// Stop the listener. The first call closes the base listener (causing
    /// the demux loop to exit and both sink queues to close) and returns
    /// that close's result; every other call, concurrent or later, is a
    /// no-op returning `Ok`.
    pub fn stop(&self) -> io::Result<()> {
        if self
            .shared
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return self.shared.base.close();
        }
        Ok(())
    }
}

/// Blocking enqueue onto a sink. A gone receiver cannot happen while the
/// sink is alive, but losing an envelope is still worth a log line.
async fn deliver<S: Send + 'static>(queue: &Sender<Envelope<S>>, envelope: Envelope<S>) {
    if queue.send(envelope).await.is_err() {
        tracing::error!("sink queue dropped; discarding delivery");
    }
}
