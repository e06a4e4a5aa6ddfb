//! Per-path lock actors: durable single-writer state machines.
//!
//! Each unique `(org, repo, path)` is served by exactly one actor identity,
//! derived deterministically by hashing the scoped path. Every operation on
//! one actor serializes through its mutex; operations on different actors run
//! fully in parallel. Actor state is persisted to the storage backend before
//! an operation returns, so a process crash immediately after a grant cannot
//! lose the transition, and a restarted process reloads the record on first
//! use.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Error, Result};
use crate::scope::RepoScope;
use crate::storage::StorageBackend;

/// Storage prefix for persisted actor records.
///
/// Underscores are invalid in org names, so this prefix can never collide
/// with a scope's object keys.
const RECORD_PREFIX: &str = "_locks/";

/// Deterministic identifier addressing one lock actor.
///
/// The id is the lowercase hex SHA-256 of `{org}/{repo}/{path}`, so repeated
/// requests for the same path always address the same actor, and a
/// client-supplied id from a previous grant resolves back to it without a
/// registry lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockActorId(String);

impl LockActorId {
    /// Derives the actor id for a lock path within a scope.
    #[must_use]
    pub fn derive(scope: &RepoScope, path: &str) -> Self {
        let digest = Sha256::digest(scope.actor_name(path).as_bytes());
        Self(hex::encode(digest))
    }

    /// Parses a client-supplied actor id.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the value is not 64 lowercase hex
    /// characters.
    pub fn from_hex(value: &str) -> Result<Self> {
        if value.len() != 64
            || !value
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(Error::InvalidInput(format!("invalid lock id: {value}")));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable record of a held lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedLock {
    path: String,
    locked_at: DateTime<Utc>,
}

/// Point-in-time view of one actor's state.
///
/// Both fields are `Some` exactly when the actor considers the lock held.
#[derive(Debug, Clone)]
pub struct LockSnapshot {
    /// The locked path, if held.
    pub path: Option<String>,
    /// When the lock was granted, if held.
    pub locked_at: Option<DateTime<Utc>>,
}

struct ActorCell {
    loaded: bool,
    held: Option<PersistedLock>,
    /// Highest grant timestamp observed by this actor instance. Grants never
    /// report a timestamp below this value.
    high_water: Option<DateTime<Utc>>,
}

/// Authoritative, serialized state for exactly one `(scope, path)` lock.
pub struct LockActor {
    id: LockActorId,
    storage: Arc<dyn StorageBackend>,
    cell: AsyncMutex<ActorCell>,
}

impl fmt::Debug for LockActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockActor").field("id", &self.id).finish()
    }
}

impl LockActor {
    fn new(id: LockActorId, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            id,
            storage,
            cell: AsyncMutex::new(ActorCell {
                loaded: false,
                held: None,
                high_water: None,
            }),
        }
    }

    /// Returns this actor's identifier.
    #[must_use]
    pub fn id(&self) -> &LockActorId {
        &self.id
    }

    fn record_key(&self) -> String {
        format!("{RECORD_PREFIX}{}.json", self.id)
    }

    /// Loads the persisted record on first use. A missing record means the
    /// actor is unlocked.
    async fn ensure_loaded(&self, cell: &mut ActorCell) -> Result<()> {
        if cell.loaded {
            return Ok(());
        }

        match self.storage.get(&self.record_key()).await {
            Ok(bytes) => {
                let record: PersistedLock = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::serialization(format!("parse lock record {}: {e}", self.id))
                })?;
                cell.high_water = Some(record.locked_at);
                cell.held = Some(record);
            }
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        cell.loaded = true;
        Ok(())
    }

    /// Grants the lock for `path`.
    ///
    /// The record is durably persisted before this returns.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyLocked` if the actor already holds a lock; the
    /// held state is left untouched. Storage failures propagate without
    /// changing state.
    pub async fn lock(&self, path: &str) -> Result<DateTime<Utc>> {
        let mut cell = self.cell.lock().await;
        self.ensure_loaded(&mut cell).await?;

        if let Some(held) = &cell.held {
            return Err(Error::AlreadyLocked {
                path: held.path.clone(),
            });
        }

        let now = Utc::now();
        let locked_at = cell.high_water.map_or(now, |high| now.max(high));
        let record = PersistedLock {
            path: path.to_string(),
            locked_at,
        };

        let bytes = serde_json::to_vec(&record)
            .map_err(|e| Error::serialization(format!("encode lock record {}: {e}", self.id)))?;
        self.storage.put(&self.record_key(), Bytes::from(bytes)).await?;

        cell.high_water = Some(locked_at);
        cell.held = Some(record);

        tracing::debug!(actor = %self.id, path = %path, locked_at = %locked_at, "lock granted");
        Ok(locked_at)
    }

    /// Releases the lock. Unlocking an already-unlocked actor is a no-op.
    ///
    /// # Errors
    ///
    /// Storage failures propagate; the actor then still considers the lock
    /// held.
    pub async fn unlock(&self) -> Result<()> {
        let mut cell = self.cell.lock().await;
        self.ensure_loaded(&mut cell).await?;

        if cell.held.is_none() {
            return Ok(());
        }

        self.storage.delete(&self.record_key()).await?;
        cell.held = None;

        tracing::debug!(actor = %self.id, "lock released");
        Ok(())
    }

    /// Returns the current `(path, locked_at)`; null fields when unlocked.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted record cannot be loaded.
    pub async fn snapshot(&self) -> Result<LockSnapshot> {
        let mut cell = self.cell.lock().await;
        self.ensure_loaded(&mut cell).await?;

        Ok(LockSnapshot {
            path: cell.held.as_ref().map(|h| h.path.clone()),
            locked_at: cell.held.as_ref().map(|h| h.locked_at),
        })
    }
}

/// Shared pool resolving actor ids to live actor instances.
///
/// All lock attempts for the same id are routed to the same instance, whose
/// mutex provides the single-writer guarantee. Instances are created lazily
/// and recover their durable state on first use.
pub struct LockActorPool {
    storage: Arc<dyn StorageBackend>,
    actors: Mutex<HashMap<String, Arc<LockActor>>>,
}

impl fmt::Debug for LockActorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockActorPool").finish_non_exhaustive()
    }
}

impl LockActorPool {
    /// Creates a pool persisting actor state to the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            actors: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the actor for `id`, creating it if this process has not
    /// addressed it yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool lock is poisoned.
    pub fn actor(&self, id: &LockActorId) -> Result<Arc<LockActor>> {
        let mut actors = self.actors.lock().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let actor = actors
            .entry(id.as_str().to_string())
            .or_insert_with(|| Arc::new(LockActor::new(id.clone(), Arc::clone(&self.storage))))
            .clone();
        Ok(actor)
    }
}
