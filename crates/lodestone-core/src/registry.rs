//! Lock registry index: a weakly consistent mapping from lock keys to actor
//! identifiers.
//!
//! The registry is a best-effort short-circuit, **not** a correctness
//! guarantee: a registry read and the corresponding actor transition share no
//! transaction, so the index may transiently disagree with actor state. The
//! authoritative source of truth for "is this path locked" is always the
//! actor addressed by the key-derived id. Callers must treat `get` results as
//! possibly stale and `scan_prefix` results as a snapshot that can miss
//! concurrent writes or include concurrent deletes.
//!
//! Production deployments back this trait with an external KV service; the
//! in-memory implementation covers tests and single-process deployments.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Point lookup / prefix scan index over lock registrations.
#[async_trait]
pub trait RegistryIndex: Send + Sync + 'static + std::fmt::Debug {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns all `(key, value)` pairs whose key starts with `prefix`.
    ///
    /// Ordering is unspecified; callers requiring deterministic order must
    /// sort the results.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;
}

/// In-memory registry index.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryIndex for MemoryRegistry {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        entries.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let entries = self.entries.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
