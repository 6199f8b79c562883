/// In-process storage backend
///
/// Keeps every key in a shared map guarded by an async lock. Clones share
/// the same map, which makes it suitable both for the `memory` deployment
/// mode and for tests that need several handles onto one store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::backend::{StoreBackend, StoreError, Stored};

/// Shared in-memory key-value map
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<RwLock<HashMap<String, Stored>>>,
}

impl MemoryBackend {
    /// Creates an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a raw value without version checks
    ///
    /// Used to seed legacy or corrupt blobs.
    pub async fn insert_raw(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().await;
        let version = entries.get(key).map(|s| s.version).unwrap_or(0) + 1;
        entries.insert(
            key.to_string(),
            Stored {
                value: value.to_string(),
                version,
            },
        );
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the backend holds no keys
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Stored>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let current = entries.get(key).map(|s| s.version).unwrap_or(0);

        if let Some(expected) = expected_version {
            if expected != current {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    expected,
                    actual: current,
                });
            }
        }

        let version = current + 1;
        entries.insert(key.to_string(), Stored { value, version });
        Ok(version)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
