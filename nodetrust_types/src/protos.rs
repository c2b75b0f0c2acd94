//! The reserved ALPN protocol identifiers used during node enrollment.
//!
//! Two categories exist. Fetch protocols complete their purpose within the
//! TLS handshake itself; no payload follows. Authenticate protocols carry
//! the node's key ID as a suffix and are the only category whose
//! connections are handed on to the embedding server after the handshake.

/// Prefix of the ALPN identifiers used by nodes authenticating with their
/// issued credentials. The node's key ID follows the prefix.
pub const AUTHENTICATE_PROTO_V1_PREFIX: &str = "v1-nodetrust-authenticate-";

/// ALPN identifier used by nodes fetching their initial credentials. The
/// handshake alone carries the exchange.
pub const FETCH_CREDS_PROTO_V1: &str = "v1-nodetrust-fetch-creds";

/// The fixed registry of reserved protocol identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct KnownProtos;

impl KnownProtos {
    /// Whether `proto` is one of the reserved identifiers.
    pub fn contains(&self, proto: &str) -> bool {
        proto == FETCH_CREDS_PROTO_V1 || self.is_authenticate(proto)
    }

    /// Whether `proto` denotes the authenticated-node sub-category.
    pub fn is_authenticate(&self, proto: &str) -> bool {
        proto.len() > AUTHENTICATE_PROTO_V1_PREFIX.len()
            && proto.starts_with(AUTHENTICATE_PROTO_V1_PREFIX)
    }

    /// The full authenticate identifier for a given key ID.
    pub fn authenticate_proto(&self, key_id: &str) -> String {
        format!("{}{}", AUTHENTICATE_PROTO_V1_PREFIX, key_id)
    }
}
