//! Shared types and boundary collaborators for the nodetrust enrollment
//! library.
//!
//! This crate holds the pieces of the library that sit at the edge of the
//! connection-demultiplexing core in `split_listener`: the registry of
//! reserved ALPN protocol identifiers, the persisted-storage contract for
//! credentials and certificates (plus a file-backed implementation), the
//! short-lived registration cache, and the deterministic human-readable
//! key-ID derivation.

pub mod error;
pub use error::*;

pub mod protos;
pub use protos::*;

pub mod storage;
pub use storage::*;

pub mod cache;
pub use cache::*;

pub mod keyid;
pub use keyid::*;
