//! Key-value storage available to connectors.
//!
//! Connectors use the store to persist small bits of state (offsets,
//! counters, cursors) across deliveries. Every backend honours the same
//! contract: a `set` is visible to a following `get` of the same key within
//! the process, and a `get` of an absent key fails with
//! [`StoreError::NotFound`] rather than returning empty data.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by [`KvStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not exist: {0}")]
    NotFound(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),

    #[error("store is closed")]
    Closed,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Flush and release the store. Later calls fail with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}

/// Open the backend selected by `config`.
pub async fn init_kv_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::File => Ok(Arc::new(FileStore::open(&config.file).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_backend_is_memory() {
        let store = init_kv_store(&StoreConfig::default()).await.unwrap();
        assert!(store.get("missing").await.unwrap_err().is_not_found());
        store.set("k", Bytes::from_static(b"v")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"v"));
    }

    #[tokio::test]
    async fn test_file_backend() {
        let dir = std::env::temp_dir().join(format!("cdk-init-store-{}", std::process::id()));
        let config = StoreConfig {
            backend: StoreBackend::File,
            file: dir.join("kv.json"),
        };
        let store = init_kv_store(&config).await.unwrap();
        store.set("offset", Bytes::from_static(b"42")).await.unwrap();
        store.close().await.unwrap();
        assert!(config.file.exists());

        std::fs::remove_dir_all(dir).unwrap();
    }
}
