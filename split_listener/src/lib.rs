//! Connection demultiplexing over a single TLS listener.
//!
//! A [`SplitListener`] wraps a base listener whose connections are (or can
//! be unwrapped as) TLS sessions, inspects each session's negotiated ALPN
//! protocol, and routes it to one of two listener-shaped sinks: one
//! receiving only the enrollment library's authenticated-node traffic, one
//! receiving everything else, including per-connection errors.
//!
//! This is useful for embedding in systems that expect to drive their own
//! accept loop off a listener, such as a gRPC-style transport server: hand
//! that server the node sink and keep the other sink for unrelated
//! protocols sharing the same port.

pub mod error;
pub use error::*;

pub mod proto;
pub use proto::*;

pub mod base;
pub use base::*;

pub mod sink;
pub use sink::*;

pub mod split;
pub use split::*;
