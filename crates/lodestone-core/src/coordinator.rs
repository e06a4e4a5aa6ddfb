//! Lock coordination: the three client-facing lock operations.
//!
//! The coordinator composes the registry index (existence short-circuit and
//! enumeration) with the addressed lock actor (authoritative state and
//! timestamp). The registry check and the later registry write are **not**
//! atomic with the actor transition: two concurrent creates for the same path
//! can both observe an absent registry entry. The actor closes that window.
//! Both requests derive the same actor id, the actor serializes them, and the
//! loser's grant fails, so at most one create succeeds even when the registry
//! race is lost.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::actor::{LockActorId, LockActorPool};
use crate::error::{Error, Result};
use crate::registry::RegistryIndex;
use crate::scope::{validate_lock_path, RepoScope};

/// Default page size for lock listings.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Maximum page size for lock listings.
pub const MAX_LIST_LIMIT: usize = 1000;

/// One active (or, on release, just-released) exclusive lock.
#[derive(Debug, Clone)]
pub struct LockRecord {
    /// Opaque lock identifier; doubles as the actor address.
    pub id: String,
    /// The locked path. `None` only on a stale release.
    pub path: Option<String>,
    /// Grant timestamp. `None` only on a stale release.
    pub locked_at: Option<DateTime<Utc>>,
}

/// Filters and pagination for a lock listing.
#[derive(Debug, Clone, Default)]
pub struct ListLocksQuery {
    /// Narrows the scan to paths starting with this prefix.
    pub path: Option<String>,
    /// Restricts the result to one exact lock id.
    pub id: Option<String>,
    /// Opaque cursor from a previous truncated page.
    pub cursor: Option<String>,
    /// Page size; clamped to `1..=MAX_LIST_LIMIT`, default
    /// `DEFAULT_LIST_LIMIT`.
    pub limit: Option<usize>,
}

/// One page of a lock listing.
#[derive(Debug, Clone)]
pub struct ListLocksPage {
    /// The locks on this page, ordered by registry key.
    pub locks: Vec<LockRecord>,
    /// Cursor for the next page, present when the listing was truncated.
    pub next_cursor: Option<String>,
}

/// Orchestrates lock create, release, and list over the registry and actors.
#[derive(Debug)]
pub struct LockCoordinator {
    registry: Arc<dyn RegistryIndex>,
    actors: LockActorPool,
}

impl LockCoordinator {
    /// Creates a coordinator over the given registry and actor pool.
    #[must_use]
    pub fn new(registry: Arc<dyn RegistryIndex>, actors: LockActorPool) -> Self {
        Self { registry, actors }
    }

    /// Creates an exclusive lock on `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::LockConflict` when the path is already registered, and
    /// `Error::AlreadyLocked` when the actor lost a create race after the
    /// registry read; both mean "someone else holds this path". Invalid paths
    /// fail with `Error::InvalidInput`.
    pub async fn create(&self, scope: &RepoScope, path: &str) -> Result<LockRecord> {
        validate_lock_path(path)?;

        let key = scope.registry_key(path);
        if self.registry.get(&key).await?.is_some() {
            tracing::info!(scope = %scope, path = %path, "lock create rejected: already registered");
            return Err(Error::LockConflict {
                path: path.to_string(),
            });
        }

        let id = LockActorId::derive(scope, path);
        let actor = self.actors.actor(&id)?;
        let locked_at = actor.lock(path).await?;

        self.registry.put(&key, id.as_str()).await?;

        tracing::info!(scope = %scope, path = %path, id = %id, "lock created");
        Ok(LockRecord {
            id: id.to_string(),
            path: Some(path.to_string()),
            locked_at: Some(locked_at),
        })
    }

    /// Releases the lock addressed by `lock_id`.
    ///
    /// Releasing an id whose actor holds no path still succeeds with null
    /// fields: the release is idempotent, but a stale reference usually means
    /// protocol misuse, so it is logged at WARN.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a malformed id; storage and registry
    /// failures propagate.
    pub async fn release(&self, scope: &RepoScope, lock_id: &str) -> Result<LockRecord> {
        // The id is the actor address; no registry lookup is needed.
        let id = LockActorId::from_hex(lock_id)?;
        let actor = self.actors.actor(&id)?;

        let snapshot = actor.snapshot().await?;
        actor.unlock().await?;

        match &snapshot.path {
            Some(path) => {
                self.registry.delete(&scope.registry_key(path)).await?;
                tracing::info!(scope = %scope, path = %path, id = %id, "lock released");
            }
            None => {
                tracing::warn!(scope = %scope, id = %id, "release of unheld lock (stale id?)");
            }
        }

        Ok(LockRecord {
            id: id.to_string(),
            path: snapshot.path,
            locked_at: snapshot.locked_at,
        })
    }

    /// Lists locks registered under `scope`.
    ///
    /// The listing trusts the registry snapshot: entries deleted concurrently
    /// may still appear and entries created concurrently may be missed. Each
    /// entry is enriched by resolving its actor; values that do not parse as
    /// actor ids are skipped.
    ///
    /// # Errors
    ///
    /// Registry and storage failures propagate.
    pub async fn list(&self, scope: &RepoScope, query: &ListLocksQuery) -> Result<ListLocksPage> {
        let prefix = scope.registry_prefix(query.path.as_deref());
        let mut entries = self.registry.scan_prefix(&prefix).await?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let mut locks = Vec::new();
        let mut next_cursor = None;
        let mut last_emitted_key: Option<String> = None;

        for (key, value) in entries {
            if let Some(cursor) = &query.cursor {
                if key.as_str() <= cursor.as_str() {
                    continue;
                }
            }
            if let Some(id_filter) = &query.id {
                if &value != id_filter {
                    continue;
                }
            }

            if locks.len() == limit {
                // More matches remain; the cursor is the last emitted key.
                next_cursor = last_emitted_key;
                break;
            }

            let Ok(id) = LockActorId::from_hex(&value) else {
                tracing::warn!(key = %key, value = %value, "skipping unparseable registry entry");
                continue;
            };

            let snapshot = match self.actors.actor(&id)?.snapshot().await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    tracing::warn!(key = %key, id = %id, error = %err, "failed to resolve lock; skipping");
                    continue;
                }
            };

            locks.push(LockRecord {
                id: id.to_string(),
                path: snapshot.path,
                locked_at: snapshot.locked_at,
            });
            last_emitted_key = Some(key);
        }

        Ok(ListLocksPage { locks, next_cursor })
    }
}
