use thiserror::Error;

/// An error that might occur when storing or retrieving records.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,
    #[error("no id given")]
    NoId,
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("I/O Error: {0}")]
    IoError(String),
    #[error("encoding error: {0}")]
    EncodingError(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::IoError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::EncodingError(e.to_string())
    }
}

/// An error that might occur when deriving a key ID.
#[derive(Error, Debug)]
pub enum KeyIdError {
    #[error("empty public key")]
    EmptyKey,
    #[error("key derivation failed: {0}")]
    Derivation(String),
}
