//! Classification of negotiated ALPN protocols.

use nodetrust_types::KnownProtos;

/// Where a connection belongs, judging by its negotiated protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtoClass {
    /// Not a reserved identifier (or no protocol was negotiated at all);
    /// the connection belongs to the embedder.
    Unknown,
    /// Reserved authenticate sub-category; the connection is forwarded
    /// live to the node sink.
    Authenticate,
    /// Reserved, but the handshake alone completes the protocol's purpose;
    /// the connection is closed without being delivered anywhere.
    HandshakeOnly,
}

/// The registry of reserved protocol identifiers, supplied by the
/// embedding enrollment system. Both predicates are pure.
pub trait ProtoRegistry: Send + Sync + 'static {
    /// Whether `proto` is a reserved identifier.
    fn contains(&self, proto: &str) -> bool;

    /// Whether `proto` denotes the authenticated-node sub-category.
    fn is_authenticate(&self, proto: &str) -> bool;
}

impl ProtoRegistry for KnownProtos {
    fn contains(&self, proto: &str) -> bool {
        KnownProtos::contains(self, proto)
    }

    fn is_authenticate(&self, proto: &str) -> bool {
        KnownProtos::is_authenticate(self, proto)
    }
}

/// Classify a negotiated protocol. Total: every input maps to exactly one
/// class and nothing here can fail.
pub fn classify<R: ProtoRegistry + ?Sized>(registry: &R, proto: Option<&str>) -> ProtoClass {
    match proto {
        Some(p) if registry.contains(p) => {
            if registry.is_authenticate(p) {
                ProtoClass::Authenticate
            } else {
                ProtoClass::HandshakeOnly
            }
        }
        _ => ProtoClass::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodetrust_types::FETCH_CREDS_PROTO_V1;

    #[test]
    fn classifies_each_category() {
        let protos = KnownProtos;
        let auth = protos.authenticate_proto("some-key-id");

        assert_eq!(classify(&protos, Some(&auth)), ProtoClass::Authenticate);
        assert_eq!(
            classify(&protos, Some(FETCH_CREDS_PROTO_V1)),
            ProtoClass::HandshakeOnly
        );
        assert_eq!(classify(&protos, Some("http/1.1")), ProtoClass::Unknown);
    }

    #[test]
    fn absent_or_empty_proto_is_unknown() {
        let protos = KnownProtos;
        assert_eq!(classify(&protos, None), ProtoClass::Unknown);
        assert_eq!(classify(&protos, Some("")), ProtoClass::Unknown);
    }
}
