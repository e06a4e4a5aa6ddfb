//! S3-compatible storage backend with real presigned URLs.
//!
//! Works against AWS S3 and S3-compatible stores such as Cloudflare R2 or
//! MinIO. Credentials, region, and a custom endpoint are taken from the
//! standard `AWS_*` environment variables (`AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, `AWS_DEFAULT_REGION`, `AWS_ENDPOINT`,
//! `AWS_ALLOW_HTTP`), matching the `object_store` crate's conventions.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as StorePath;
use object_store::signer::Signer;
use object_store::{ObjectStore, PutPayload};

use crate::error::{Error, Result};
use crate::storage::{ObjectMeta, StorageBackend};

/// Storage backend for S3-compatible object stores.
#[derive(Debug)]
pub struct S3Backend {
    store: AmazonS3,
    bucket: String,
}

impl S3Backend {
    /// Creates a backend for the given bucket.
    ///
    /// Accepts a bare bucket name or an `s3://bucket` URI.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket name is empty or the client cannot be
    /// constructed from the environment.
    pub fn from_bucket(bucket: &str) -> Result<Self> {
        let name = bucket
            .trim()
            .trim_start_matches("s3://")
            .trim_end_matches('/');
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "storage bucket name cannot be empty".to_string(),
            ));
        }

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(name);
        if std::env::var("AWS_REGION").is_err() && std::env::var("AWS_DEFAULT_REGION").is_err() {
            // R2-style stores ignore the region; AWS requires one.
            builder = builder.with_region("us-east-1");
        }
        let store = builder
            .build()
            .map_err(|e| Error::storage_with_source("failed to build S3 client", e))?;

        Ok(Self {
            store,
            bucket: name.to_string(),
        })
    }

    /// Returns the bucket this backend operates on.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = StorePath::from(path);
        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::NotFound(format!("object not found: {path}"))
            }
            other => Error::storage_with_source(format!("get failed: {path}"), other),
        })?;

        result
            .bytes()
            .await
            .map_err(|e| Error::storage_with_source(format!("read failed: {path}"), e))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let location = StorePath::from(path);
        self.store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| Error::storage_with_source(format!("put failed: {path}"), e))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = StorePath::from(path);
        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(Error::storage_with_source(
                format!("delete failed: {path}"),
                e,
            )),
        }
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let location = StorePath::from(path);
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                path: path.to_string(),
                size: meta.size as u64,
                last_modified: Some(meta.last_modified),
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Error::storage_with_source(
                format!("head failed: {path}"),
                e,
            )),
        }
    }

    async fn signed_upload_url(
        &self,
        path: &str,
        _content_length: u64,
        expiry: Duration,
    ) -> Result<String> {
        // The declared size cannot be bound into a generic V4 signature;
        // the store enforces only the key and method.
        let location = StorePath::from(path);
        let url = self
            .store
            .signed_url(Method::PUT, &location, expiry)
            .await
            .map_err(|e| Error::storage_with_source(format!("sign upload failed: {path}"), e))?;
        Ok(url.to_string())
    }

    async fn signed_download_url(&self, path: &str, expiry: Duration) -> Result<String> {
        let location = StorePath::from(path);
        let url = self
            .store
            .signed_url(Method::GET, &location, expiry)
            .await
            .map_err(|e| Error::storage_with_source(format!("sign download failed: {path}"), e))?;
        Ok(url.to_string())
    }
}
