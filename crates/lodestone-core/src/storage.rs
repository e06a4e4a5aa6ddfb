//! Storage backend abstraction for object storage (S3, R2, local memory).
//!
//! The contract covers exactly what the server needs from a store:
//! durable reads/writes for actor state, existence checks for the download
//! path, and presigned URL issuance for both transfer directions. Clients
//! never stream object bytes through this server; they go straight to the
//! store with the URLs minted here.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for object storage.
///
/// All storage backends (S3-compatible, memory) implement this trait.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an object, replacing any previous contents.
    ///
    /// The write must be acknowledged by the store before this returns.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Deletes an object.
    ///
    /// Succeeds even if the object doesn't exist (idempotent).
    async fn delete(&self, path: &str) -> Result<()>;

    /// Gets object metadata without reading content.
    ///
    /// Returns `None` if the object doesn't exist. A transport failure is an
    /// `Err`, never `None`.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;

    /// Generates a presigned URL granting a single write of `path`.
    ///
    /// `content_length` is the client-declared size of the upload; backends
    /// that cannot bind it into the signature issue an unconstrained URL.
    async fn signed_upload_url(
        &self,
        path: &str,
        content_length: u64,
        expiry: Duration,
    ) -> Result<String>;

    /// Generates a presigned URL granting a single read of `path`.
    async fn signed_download_url(&self, path: &str, expiry: Duration) -> Result<String>;
}

/// In-memory storage backend for testing and debug deployments.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(path);
        Ok(())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects.get(path).map(|obj| ObjectMeta {
            path: path.to_string(),
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
        }))
    }

    async fn signed_upload_url(
        &self,
        path: &str,
        content_length: u64,
        expiry: Duration,
    ) -> Result<String> {
        // Mock implementation for testing
        Ok(format!(
            "memory://localhost/{path}?mode=upload&length={content_length}&expires={}&signature=mock",
            expiry.as_secs()
        ))
    }

    async fn signed_download_url(&self, path: &str, expiry: Duration) -> Result<String> {
        Ok(format!(
            "memory://localhost/{path}?mode=download&expires={}&signature=mock",
            expiry.as_secs()
        ))
    }
}
