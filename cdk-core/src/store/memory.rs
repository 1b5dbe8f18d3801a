//! In-process store, the default backend.

use super::{KvStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A `HashMap` behind a lock. Contents are lost when the process exits.
#[derive(Debug)]
pub struct MemoryStore {
    /// `None` once closed.
    entries: RwLock<Option<HashMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Some(HashMap::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(StoreError::Closed)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let guard = self.entries.read().await;
        let entries = guard.as_ref().ok_or(StoreError::Closed)?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut guard = self.entries.write().await;
        let entries = guard.as_mut().ok_or(StoreError::Closed)?;
        entries.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.entries.write().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("offset", Bytes::from_static(b"42")).await.unwrap();
        assert_eq!(store.get("offset").await.unwrap(), Bytes::from_static(b"42"));

        store.set("offset", Bytes::from_static(b"43")).await.unwrap();
        assert_eq!(store.get("offset").await.unwrap(), Bytes::from_static(b"43"));

        store.delete("offset").await.unwrap();
        assert!(store.get("offset").await.unwrap_err().is_not_found());
        store.delete("offset").await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_value_is_not_missing() {
        let store = MemoryStore::new();
        store.set("empty", Bytes::new()).await.unwrap();
        assert_eq!(store.get("empty").await.unwrap(), Bytes::new());
        assert!(store.get("other").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = MemoryStore::new();
        store.close().await.unwrap();
        assert!(matches!(
            store.set("k", Bytes::new()).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(store.get("k").await, Err(StoreError::Closed)));
    }
}
