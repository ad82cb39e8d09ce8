//! In-memory SnapshotStore implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SnapshotStore;
use crate::error::StoreError;

/// Snapshot store kept in a `HashMap`
///
/// Lost on restart. Can be switched into a failing mode to exercise the
/// outage paths of the session manager.
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.check()?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        self.check()?;
        let mut entries = self.entries.write().await;
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let store = MemorySnapshotStore::new();
        assert!(store.get("room:nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = MemorySnapshotStore::new();
        store.set("room:a", b"one".to_vec()).await.unwrap();
        store.set("room:a", b"two".to_vec()).await.unwrap();

        assert_eq!(store.get("room:a").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn scan_filters_by_prefix() {
        let store = MemorySnapshotStore::new();
        store.set("room:a", Vec::new()).await.unwrap();
        store.set("room:b", Vec::new()).await.unwrap();
        store.set("other:c", Vec::new()).await.unwrap();

        let mut keys = store.scan("room:").await.unwrap();
        keys.sort();

        assert_eq!(keys, vec!["room:a", "room:b"]);
    }

    #[tokio::test]
    async fn delete_counts_existing_keys() {
        let store = MemorySnapshotStore::new();
        store.set("room:a", Vec::new()).await.unwrap();

        let removed = store
            .delete(&["room:a".to_string(), "room:missing".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemorySnapshotStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.get("room:a").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.set("room:a", Vec::new()).await.is_err());

        store.set_unavailable(false);
        assert!(store.set("room:a", Vec::new()).await.is_ok());
    }
}
