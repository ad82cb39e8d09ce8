//! Snapshot store abstraction
//!
//! Rooms are persisted as opaque byte snapshots under `room:<id>` keys. The
//! store is a plain key-value service with no versioning: a load, mutate,
//! save sequence from two processes can lose one update.

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::StoreError;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

/// Key-value persistence for room snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Bytes stored under `key`, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// All keys starting with `prefix`
    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Delete the given keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError>;
}
