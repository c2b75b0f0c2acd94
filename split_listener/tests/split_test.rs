//! Demux loop behaviour, driven by a scripted in-memory base listener.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

use nodetrust_types::{KnownProtos, FETCH_CREDS_PROTO_V1};
use split_listener::{
    AcceptError, BaseListener, ConnectionError, IncomingConn, ListenerError, SessionError,
    SplitListener,
};

/// One scripted accept outcome.
enum Script {
    Conn(TestConn),
    Err(AcceptError),
}

impl Script {
    fn conn(tag: &'static str, proto: Option<String>) -> Self {
        Self::Conn(TestConn::Tls { tag, proto })
    }
}

enum TestConn {
    Tls { tag: &'static str, proto: Option<String> },
    NotTls,
    HandshakeFail(&'static str),
}

#[derive(Debug)]
struct TestSession {
    tag: &'static str,
}

#[async_trait]
impl IncomingConn for TestConn {
    type Session = TestSession;

    async fn into_session(self) -> Result<(TestSession, Option<String>), SessionError> {
        match self {
            TestConn::Tls { tag, proto } => Ok((TestSession { tag }, proto)),
            TestConn::NotTls => Err(SessionError::NotTls),
            TestConn::HandshakeFail(msg) => Err(SessionError::Handshake(msg.to_string())),
        }
    }
}

struct TestListener {
    script: Mutex<UnboundedReceiver<Script>>,
    closed: AtomicBool,
    close_signal: Notify,
    close_count: Arc<AtomicUsize>,
    addr: SocketAddr,
}

#[async_trait]
impl BaseListener for TestListener {
    type Conn = TestConn;

    async fn accept(&self) -> Result<TestConn, AcceptError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AcceptError::Closed);
        }
        let mut script = self.script.lock().await;
        tokio::select! {
            _ = self.close_signal.notified() => Err(AcceptError::Closed),
            item = script.recv() => match item {
                Some(Script::Conn(conn)) => Ok(conn),
                Some(Script::Err(e)) => Err(e),
                None => {
                    // Script exhausted: sit idle like a listener with no
                    // clients until closed
                    self.close_signal.notified().await;
                    Err(AcceptError::Closed)
                }
            },
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }

    fn close(&self) -> io::Result<()> {
        self.close_count.fetch_add(1, Ordering::AcqRel);
        self.closed.store(true, Ordering::Release);
        self.close_signal.notify_one();
        Ok(())
    }
}

fn scripted() -> (
    Arc<SplitListener<TestListener, KnownProtos>>,
    UnboundedSender<Script>,
    Arc<AtomicUsize>,
) {
    let (script_send, script_recv) = unbounded_channel();
    let close_count = Arc::new(AtomicUsize::new(0));
    let listener = TestListener {
        script: Mutex::new(script_recv),
        closed: AtomicBool::new(false),
        close_signal: Notify::new(),
        close_count: close_count.clone(),
        addr: "127.0.0.1:4444".parse().unwrap(),
    };
    (
        Arc::new(SplitListener::new(listener, KnownProtos)),
        script_send,
        close_count,
    )
}

fn spawn_engine(
    split: &Arc<SplitListener<TestListener, KnownProtos>>,
) -> tokio::task::JoinHandle<ListenerError> {
    let split = split.clone();
    tokio::spawn(async move { split.start().await })
}

fn auth_proto() -> Option<String> {
    Some(KnownProtos.authenticate_proto("test-key-id"))
}

#[tokio::test]
async fn routes_by_negotiated_proto() {
    let (split, script, _) = scripted();
    let node = split.node_listener();
    let other = split.other_listener();
    let engine = spawn_engine(&split);

    script.send(Script::conn("node-1", auth_proto())).unwrap();
    script.send(Script::conn("web-1", None)).unwrap();

    assert_eq!(node.accept().await.unwrap().tag, "node-1");
    assert_eq!(other.accept().await.unwrap().tag, "web-1");

    split.stop().unwrap();
    assert!(matches!(engine.await.unwrap(), ListenerError::Closed));
}

#[tokio::test]
async fn handshake_only_protos_are_dropped_silently() {
    let (split, script, _) = scripted();
    let node = split.node_listener();
    let other = split.other_listener();
    let engine = spawn_engine(&split);

    script
        .send(Script::conn("fetch-1", Some(FETCH_CREDS_PROTO_V1.to_string())))
        .unwrap();
    script.send(Script::conn("node-1", auth_proto())).unwrap();

    // The loop kept going past the fetch connection
    assert_eq!(node.accept().await.unwrap().tag, "node-1");

    split.stop().unwrap();
    assert!(matches!(engine.await.unwrap(), ListenerError::Closed));

    // Nothing was ever delivered for the fetch connection
    assert!(matches!(other.accept().await, Err(ConnectionError::Closed)));
}

#[tokio::test]
async fn bad_connections_surface_as_errors_on_the_other_sink() {
    let (split, script, _) = scripted();
    let node = split.node_listener();
    let other = split.other_listener();
    let engine = spawn_engine(&split);

    script.send(Script::Conn(TestConn::NotTls)).unwrap();
    script
        .send(Script::Conn(TestConn::HandshakeFail("bad client hello")))
        .unwrap();
    script.send(Script::conn("web-1", None)).unwrap();

    match other.accept().await {
        Err(ConnectionError::Transient(msg)) => assert!(msg.contains("expected tls")),
        res => panic!("expected transient error, got {res:?}"),
    }
    match other.accept().await {
        Err(ConnectionError::Transient(msg)) => assert!(msg.contains("bad client hello")),
        res => panic!("expected transient error, got {res:?}"),
    }
    // Errors interleave with live connections on the same sink
    assert_eq!(other.accept().await.unwrap().tag, "web-1");

    split.stop().unwrap();
    engine.await.unwrap();
    assert!(matches!(node.accept().await, Err(ConnectionError::Closed)));
}

#[tokio::test]
async fn retryable_accept_errors_are_absorbed() {
    let (split, script, _) = scripted();
    let node = split.node_listener();
    let engine = spawn_engine(&split);

    script
        .send(Script::Err(AcceptError::Retryable("accept: EMFILE".into())))
        .unwrap();
    script.send(Script::conn("node-1", auth_proto())).unwrap();

    assert_eq!(node.accept().await.unwrap().tag, "node-1");

    split.stop().unwrap();
    assert!(matches!(engine.await.unwrap(), ListenerError::Closed));
}

#[tokio::test]
async fn fatal_accept_error_terminates_the_loop() {
    let (split, script, close_count) = scripted();
    let node = split.node_listener();
    let other = split.other_listener();
    let engine = spawn_engine(&split);

    script
        .send(Script::Err(AcceptError::Fatal("socket vanished".into())))
        .unwrap();

    match engine.await.unwrap() {
        ListenerError::IoError(msg) => assert!(msg.contains("socket vanished")),
        err => panic!("expected io error, got {err:?}"),
    }

    // Both sinks report closed from now on
    assert!(matches!(node.accept().await, Err(ConnectionError::Closed)));
    assert!(matches!(other.accept().await, Err(ConnectionError::Closed)));

    // The fatal exit marked the listener stopped, so stop() must not try
    // to close the dead base listener
    split.stop().unwrap();
    assert_eq!(close_count.load(Ordering::Acquire), 0);
}

#[tokio::test]
async fn stop_is_idempotent_under_concurrent_callers() {
    let (split, _script, close_count) = scripted();
    let engine = spawn_engine(&split);

    let stoppers: Vec<_> = (0..8)
        .map(|_| {
            let split = split.clone();
            tokio::spawn(async move { split.stop() })
        })
        .collect();
    for stopper in stoppers {
        stopper.await.unwrap().unwrap();
    }

    assert!(matches!(engine.await.unwrap(), ListenerError::Closed));
    assert_eq!(close_count.load(Ordering::Acquire), 1);

    // And still a no-op afterwards
    split.stop().unwrap();
    assert_eq!(close_count.load(Ordering::Acquire), 1);
}

#[tokio::test]
async fn closed_sinks_answer_immediately_forever() {
    let (split, _script, _) = scripted();
    let node = split.node_listener();
    let other = split.other_listener();
    let engine = spawn_engine(&split);

    split.stop().unwrap();
    engine.await.unwrap();

    for _ in 0..3 {
        let res = timeout(Duration::from_millis(100), node.accept()).await;
        assert!(matches!(res, Ok(Err(ConnectionError::Closed))));
        let res = timeout(Duration::from_millis(100), other.accept()).await;
        assert!(matches!(res, Ok(Err(ConnectionError::Closed))));
    }
}

#[tokio::test]
async fn delivery_order_per_sink_matches_classification_order() {
    let (split, script, _) = scripted();
    let node = split.node_listener();
    let other = split.other_listener();
    let engine = spawn_engine(&split);

    let node_task = tokio::spawn(async move {
        let mut tags = Vec::new();
        for _ in 0..2 {
            tags.push(node.accept().await.unwrap().tag);
        }
        tags
    });
    let other_task = tokio::spawn(async move {
        let mut tags = Vec::new();
        for _ in 0..3 {
            tags.push(other.accept().await.unwrap().tag);
        }
        tags
    });

    for item in [
        Script::conn("n1", auth_proto()),
        Script::conn("o1", None),
        Script::conn("o2", None),
        Script::conn("n2", auth_proto()),
        Script::conn("o3", None),
    ] {
        script.send(item).unwrap();
    }

    assert_eq!(node_task.await.unwrap(), vec!["n1", "n2"]);
    assert_eq!(other_task.await.unwrap(), vec!["o1", "o2", "o3"]);

    split.stop().unwrap();
    engine.await.unwrap();
}

#[tokio::test]
async fn stalled_sink_stalls_the_whole_loop() {
    let (split, script, _) = scripted();
    let node = split.node_listener();
    let other = split.other_listener();
    let engine = spawn_engine(&split);

    // Nobody reads the node sink. n1 fills its one-slot queue, n2 blocks
    // the loop mid-delivery, so o1 is never even accepted.
    script.send(Script::conn("n1", auth_proto())).unwrap();
    script.send(Script::conn("n2", auth_proto())).unwrap();
    script.send(Script::conn("o1", None)).unwrap();

    let res = timeout(Duration::from_millis(150), other.accept()).await;
    assert!(res.is_err(), "other sink should see nothing while stalled");

    // Draining the node sink unblocks the loop and o1 flows through
    assert_eq!(node.accept().await.unwrap().tag, "n1");
    assert_eq!(node.accept().await.unwrap().tag, "n2");
    assert_eq!(other.accept().await.unwrap().tag, "o1");

    split.stop().unwrap();
    engine.await.unwrap();
}

#[tokio::test]
async fn sinks_delegate_address_and_ignore_close() {
    let (split, script, close_count) = scripted();
    let other = split.other_listener();
    let engine = spawn_engine(&split);

    let addr: SocketAddr = "127.0.0.1:4444".parse().unwrap();
    assert_eq!(other.local_addr(), Some(addr));

    // Closing a sink is a no-op: nothing closes, traffic keeps flowing
    other.close();
    assert_eq!(close_count.load(Ordering::Acquire), 0);
    script.send(Script::conn("web-1", None)).unwrap();
    assert_eq!(other.accept().await.unwrap().tag, "web-1");

    split.stop().unwrap();
    engine.await.unwrap();
}

#[tokio::test]
async fn start_runs_at_most_once() {
    let (split, script, _) = scripted();
    let node = split.node_listener();
    let engine = spawn_engine(&split);

    // Make sure the first start owns the loop before trying again
    script.send(Script::conn("node-1", auth_proto())).unwrap();
    node.accept().await.unwrap();

    assert!(matches!(split.start().await, ListenerError::AlreadyStarted));

    split.stop().unwrap();
    assert!(matches!(engine.await.unwrap(), ListenerError::Closed));
}
