/// Storage backend abstraction
///
/// A backend is a flat, versioned key-value map of serialized collections.
/// Every successful write bumps the key's version by one. A version of `0`
/// means the key does not exist.
///
/// # Conditional writes
///
/// `put` takes an optional expected version:
///
/// - `None`: unconditional write (last write wins)
/// - `Some(0)`: create only, fails if the key already exists
/// - `Some(v)`: write only if the stored version is still `v`
///
/// A failed condition is reported as [`StoreError::Conflict`].

use async_trait::async_trait;
use thiserror::Error;

/// Error type for record store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version moved since it was read
    #[error("Write conflict on {key}: expected version {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Collection could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend I/O failure (database, Redis, ...)
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored collection exists but could not be decoded
    #[error("Unreadable collection {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Optimistic retries were exhausted
    #[error("Gave up on {key} after {attempts} conflicting attempts")]
    RetriesExhausted { key: String, attempts: u32 },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(format!("Database error: {}", err))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(format!("Redis error: {}", err))
    }
}

/// A serialized value with its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    /// Serialized collection text
    pub value: String,

    /// Current version (always >= 1 for stored values)
    pub version: u64,
}

/// Versioned key-value storage
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Reads a key, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<Stored>, StoreError>;

    /// Writes a key, returning the new version
    async fn put(
        &self,
        key: &str,
        value: String,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Deletes a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;

    /// Checks the backend is reachable
    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
