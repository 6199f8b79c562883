/// Record store
///
/// Durable storage of homogeneous record collections, one collection per
/// [`EntityType`]. A collection is always read and written whole; there is
/// no indexing and no query language, so callers filter after `load`.
///
/// # Modules
///
/// - [`backend`]: the versioned key-value trait every backend implements
/// - [`memory`]: process-local backend (tests, single-node deployments)
/// - [`postgres`]: PostgreSQL backend via sqlx
/// - [`redis`]: Redis backend with a Lua compare-and-set
/// - [`schema`]: versioned envelope and upgrade steps
/// - [`entity`]: the persisted collection names
///
/// # Write policies
///
/// `append` is load → push → save. Under [`WritePolicy::LastWriteWins`] two
/// writers that loaded the same version both succeed and the later one
/// silently drops the earlier record. Under [`WritePolicy::Optimistic`] the
/// later writer gets [`StoreError::Conflict`] instead. [`RecordStore::modify`]
/// is always optimistic and retries on conflict.
///
/// # Example
///
/// ```
/// use bizacc_shared::store::{EntityType, RecordStore};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RecordStore::memory();
/// store.append(EntityType::Products, json!({"id": "p1", "name": "Widget"})).await?;
///
/// let products: Vec<serde_json::Value> = store.load(EntityType::Products).await;
/// assert_eq!(products.len(), 1);
/// # Ok(())
/// # }
/// ```

pub mod backend;
pub mod entity;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod schema;

pub use backend::{StoreBackend, StoreError, Stored};
pub use entity::EntityType;
pub use memory::MemoryBackend;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default key namespace
pub const DEFAULT_NAMESPACE: &str = "bizacc";

/// Default number of attempts for [`RecordStore::modify`]
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// How `save_snapshot` and `append` treat concurrent writers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// The last writer wins; earlier concurrent writes are lost
    LastWriteWins,

    /// Writes fail with a conflict when the collection changed since load
    Optimistic,
}

impl WritePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePolicy::LastWriteWins => "last_write_wins",
            WritePolicy::Optimistic => "optimistic",
        }
    }
}

impl FromStr for WritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last_write_wins" | "lww" => Ok(WritePolicy::LastWriteWins),
            "optimistic" => Ok(WritePolicy::Optimistic),
            other => Err(format!("Unknown write policy: {}", other)),
        }
    }
}

/// Which backend a deployment stores collections in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Postgres,
    Redis,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(BackendKind::Memory),
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "redis" => Ok(BackendKind::Redis),
            other => Err(format!("Unknown store backend: {}", other)),
        }
    }
}

/// A collection together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Decoded records
    pub records: Vec<T>,

    /// Stored version, `0` when the collection did not exist
    pub version: u64,
}

impl<T> Snapshot<T> {
    /// An absent collection
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            version: 0,
        }
    }
}

/// Namespaced, versioned collection store
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn StoreBackend>,
    namespace: Arc<str>,
    policy: WritePolicy,
    max_retries: u32,
}

impl RecordStore {
    /// Creates a store on a backend with the default namespace and
    /// optimistic writes
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            namespace: Arc::from(DEFAULT_NAMESPACE),
            policy: WritePolicy::Optimistic,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Creates a store on a fresh [`MemoryBackend`]
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Sets the key namespace
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Arc::from(namespace);
        self
    }

    /// Sets the write policy for `save_snapshot` and `append`
    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets how many attempts `modify` makes before giving up
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the backend, for health output
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Checks the backend is reachable
    pub async fn health(&self) -> Result<(), StoreError> {
        self.backend.health().await
    }

    /// Full backend key of a collection
    pub fn key_for(&self, entity: EntityType) -> String {
        format!("{}:{}", self.namespace, entity.key())
    }

    /// Loads all records of a collection
    ///
    /// Never fails: missing, corrupt, or unreadable collections load as
    /// empty and the cause is logged.
    pub async fn load<T: DeserializeOwned>(&self, entity: EntityType) -> Vec<T> {
        match self.load_snapshot(entity).await {
            Ok(snapshot) => snapshot.records,
            Err(e) => {
                warn!(entity = %entity, error = %e, "Failed to load collection, using empty");
                Vec::new()
            }
        }
    }

    /// Loads a collection with its version
    ///
    /// Read-modify-write paths go through here, so unlike [`load`] an
    /// unreadable collection is an error rather than an empty list.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] when the stored blob or any of its records
    /// cannot be decoded, or the backend error.
    ///
    /// [`load`]: RecordStore::load
    pub async fn load_snapshot<T: DeserializeOwned>(
        &self,
        entity: EntityType,
    ) -> Result<Snapshot<T>, StoreError> {
        let key = self.key_for(entity);
        let Some(stored) = self.backend.get(&key).await? else {
            return Ok(Snapshot::empty());
        };

        let decoded = schema::decode_collection(&stored.value)
            .map_err(|e| e.to_string())
            .and_then(|mut values| {
                if entity.is_owned() {
                    schema::assign_missing_ids(&mut values);
                }
                serde_json::from_value::<Vec<T>>(Value::Array(values)).map_err(|e| e.to_string())
            });

        match decoded {
            Ok(records) => Ok(Snapshot {
                records,
                version: stored.version,
            }),
            Err(reason) => {
                warn!(entity = %entity, version = stored.version, error = %reason, "Corrupt collection");
                Err(StoreError::Corrupt { key, reason })
            }
        }
    }

    /// Replaces a whole collection
    pub async fn save<T: Serialize>(
        &self,
        entity: EntityType,
        records: &[T],
    ) -> Result<u64, StoreError> {
        let text = encode(records)?;
        let version = self.backend.put(&self.key_for(entity), text, None).await?;
        debug!(entity = %entity, count = records.len(), version, "Collection saved");
        Ok(version)
    }

    /// Writes back a snapshot according to the write policy
    pub async fn save_snapshot<T: Serialize>(
        &self,
        entity: EntityType,
        snapshot: &Snapshot<T>,
    ) -> Result<u64, StoreError> {
        let text = encode(&snapshot.records)?;
        let expected = match self.policy {
            WritePolicy::LastWriteWins => None,
            WritePolicy::Optimistic => Some(snapshot.version),
        };

        self.backend.put(&self.key_for(entity), text, expected).await
    }

    /// Appends one record: load → push → save
    ///
    /// Records are handled as raw JSON so fields unknown to `T` survive.
    pub async fn append<T: Serialize>(
        &self,
        entity: EntityType,
        record: T,
    ) -> Result<u64, StoreError> {
        let mut snapshot = self.load_snapshot::<Value>(entity).await?;
        snapshot.records.push(serde_json::to_value(record)?);
        self.save_snapshot(entity, &snapshot).await
    }

    /// Read-modify-write with optimistic retries
    ///
    /// `f` may run several times if other writers interfere; it must not
    /// have side effects outside the records it is given.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, backend errors, or
    /// [`StoreError::RetriesExhausted`].
    pub async fn modify<T, R, E, F>(&self, entity: EntityType, mut f: F) -> Result<R, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
        F: FnMut(&mut Vec<T>) -> Result<R, E>,
    {
        let key = self.key_for(entity);

        for attempt in 1..=self.max_retries {
            let mut snapshot = self.load_snapshot::<T>(entity).await?;
            let result = f(&mut snapshot.records)?;
            let text = encode(&snapshot.records)?;

            match self.backend.put(&key, text, Some(snapshot.version)).await {
                Ok(_) => return Ok(result),
                Err(StoreError::Conflict { .. }) => {
                    debug!(entity = %entity, attempt, "Write conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::RetriesExhausted {
            key,
            attempts: self.max_retries,
        }
        .into())
    }

    /// Loads a single-object key such as [`EntityType::User`]
    pub async fn load_object<T: DeserializeOwned>(&self, entity: EntityType) -> Option<T> {
        let stored = match self.backend.get(&self.key_for(entity)).await {
            Ok(stored) => stored?,
            Err(e) => {
                warn!(entity = %entity, error = %e, "Failed to load object");
                return None;
            }
        };

        let decoded = schema::decode_object(&stored.value)
            .map_err(|e| e.to_string())
            .and_then(|value| serde_json::from_value(value).map_err(|e| e.to_string()));

        match decoded {
            Ok(object) => Some(object),
            Err(error) => {
                warn!(entity = %entity, %error, "Corrupt object, ignoring");
                None
            }
        }
    }

    /// Stores a single-object key
    pub async fn save_object<T: Serialize>(
        &self,
        entity: EntityType,
        object: &T,
    ) -> Result<u64, StoreError> {
        let text = serde_json::to_string(object)?;
        self.backend.put(&self.key_for(entity), text, None).await
    }

    /// Removes a key entirely
    pub async fn clear(&self, entity: EntityType) -> Result<bool, StoreError> {
        self.backend.delete(&self.key_for(entity)).await
    }
}

fn encode<T: Serialize>(records: &[T]) -> Result<String, StoreError> {
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(schema::encode_collection(values)?)
}
