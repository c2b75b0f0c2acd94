//! File-backed [`Storage`] implementation.
//!
//! Each record lives in its own file at `<root>/<kind>/<id>`. Suitable for
//! single-process embedders; anything needing coordination should supply
//! its own `Storage`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::StorageError;
use crate::storage::{RecordKind, Storage};

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a storage rooted at the given directory. The directory is
    /// created if it does not exist.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, kind: RecordKind, id: &str) -> Result<PathBuf, StorageError> {
        if id.is_empty() {
            return Err(StorageError::NoId);
        }
        // Ids become file names, so nothing that walks the tree is allowed
        if id.contains(&['/', '\\'][..]) || id == "." || id == ".." {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(kind.as_str()).join(id))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn store(&self, kind: RecordKind, id: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.record_path(kind, id)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::IoError(e.to_string()))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        tracing::debug!(kind = %kind, id = %id, "stored record");
        Ok(())
    }

    async fn load(&self, kind: RecordKind, id: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.record_path(kind, id)?;
        Ok(fs::read(&path).await?)
    }

    async fn remove(&self, kind: RecordKind, id: &str) -> Result<(), StorageError> {
        let path = self.record_path(kind, id)?;
        fs::remove_file(&path).await?;
        tracing::debug!(kind = %kind, id = %id, "removed record");
        Ok(())
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<String>, StorageError> {
        let dir = self.root.join(kind.as_str());
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // A kind nothing has been stored under lists as empty
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::IoError(e.to_string())),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?
        {
            if let Ok(name) = entry.file_name().into_string() {
                ids.push(name);
            }
        }
        Ok(ids)
    }
}
