//! The persisted-storage contract for enrollment records.
//!
//! Implementations store opaque serialized records keyed by kind and id;
//! the typed layer on top ([`StorageExt`]) handles JSON encoding and
//! enforces that every stored record carries an id.

use std::fmt;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::StorageError;

pub mod file;
pub use file::FileStorage;

/// The kinds of record the enrollment library persists. The kind namespaces
/// ids, so implementations can keep each kind in its own location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    NodeCredentials,
    NodeInformation,
    RootCertificate,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeCredentials => "node_credentials",
            Self::NodeInformation => "node_information",
            Self::RootCertificate => "root_certificate",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that can be persisted. Identity travels inside the record; a
/// record with an empty id cannot be stored.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const KIND: RecordKind;

    fn id(&self) -> &str;
}

/// Byte-level storage contract. Object safe so embedders can hand the
/// library a `dyn Storage`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under the given kind and id, replacing any previous
    /// value.
    async fn store(&self, kind: RecordKind, id: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Load the bytes stored under the given kind and id. Returns
    /// [`StorageError::NotFound`] if nothing is stored there.
    async fn load(&self, kind: RecordKind, id: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the value stored under the given kind and id. Returns
    /// [`StorageError::NotFound`] if nothing is stored there.
    async fn remove(&self, kind: RecordKind, id: &str) -> Result<(), StorageError>;

    /// List the ids stored under the given kind.
    async fn list(&self, kind: RecordKind) -> Result<Vec<String>, StorageError>;
}

/// Typed convenience layer over [`Storage`].
#[async_trait]
pub trait StorageExt: Storage {
    /// Serialize and store a record under its own kind and id.
    async fn store_record<R: Record + 'static>(&self, record: &R) -> Result<(), StorageError> {
        if record.id().is_empty() {
            return Err(StorageError::NoId);
        }
        let data = serde_json::to_vec(record)?;
        self.store(R::KIND, record.id(), &data).await
    }

    /// Load and deserialize the record of the given type with the given id.
    async fn load_record<R: Record + 'static>(&self, id: &str) -> Result<R, StorageError> {
        if id.is_empty() {
            return Err(StorageError::NoId);
        }
        let data = self.load(R::KIND, id).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// Credentials issued to a node, held by the node itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeCredentials {
    pub id: String,
    pub certificate_private_key_pkcs8: Vec<u8>,
    pub certificate_der: Vec<u8>,
}

impl Record for NodeCredentials {
    const KIND: RecordKind = RecordKind::NodeCredentials;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Server-side view of an enrolled node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInformation {
    pub id: String,
    pub certificate_public_key_pkix: Vec<u8>,
}

impl Record for NodeInformation {
    const KIND: RecordKind = RecordKind::NodeInformation;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A root certificate and its private key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RootCertificate {
    pub id: String,
    pub certificate_der: Vec<u8>,
    pub private_key_pkcs8: Vec<u8>,
}

impl Record for RootCertificate {
    const KIND: RecordKind = RecordKind::RootCertificate;

    fn id(&self) -> &str {
        &self.id
    }
}
