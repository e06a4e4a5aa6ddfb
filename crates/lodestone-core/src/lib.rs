//! # lodestone-core
//!
//! Core domain logic for Lodestone, a Git LFS batch-transfer and file-locking
//! server.
//!
//! This crate provides everything below the HTTP surface:
//!
//! - **Storage Abstraction**: Object-store contract with presigned URL issuance
//! - **Repo Scoping**: Validated `(org, repo)` pairs partitioning all state
//! - **Lock Actors**: Per-path single-writer state machines, durable in storage
//! - **Lock Coordination**: Create/release/list composed over a weakly
//!   consistent registry index plus the authoritative actors
//! - **Transfer Negotiation**: Per-object upload/download decisions
//!
//! ## Consistency model
//!
//! The registry index is a best-effort cache and is **not** linearizable with
//! actor state: a registry read, the actor transition, and the registry write
//! are three separate operations. The authoritative answer to "is this path
//! locked" is always the actor addressed by the deterministic id derived from
//! `{org}/{repo}/{path}`, which serializes every operation sent to it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lodestone_core::prelude::*;
//!
//! let storage = Arc::new(MemoryBackend::new());
//! let registry = Arc::new(MemoryRegistry::new());
//! let coordinator = LockCoordinator::new(registry, LockActorPool::new(storage));
//!
//! let scope = RepoScope::new("acme", "textures")?;
//! let record = coordinator.create(&scope, "assets/tex.png").await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod actor;
pub mod coordinator;
pub mod error;
pub mod observability;
pub mod registry;
pub mod s3;
pub mod scope;
pub mod storage;
pub mod transfer;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use lodestone_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::actor::{LockActor, LockActorId, LockActorPool};
    pub use crate::coordinator::{ListLocksQuery, ListLocksPage, LockCoordinator, LockRecord};
    pub use crate::error::{Error, Result};
    pub use crate::registry::{MemoryRegistry, RegistryIndex};
    pub use crate::scope::RepoScope;
    pub use crate::storage::{MemoryBackend, ObjectMeta, StorageBackend};
    pub use crate::transfer::{BatchRequest, BatchResponse, Operation, TransferNegotiator};
}

// Re-export key types at crate root for ergonomics
pub use actor::{LockActor, LockActorId, LockActorPool};
pub use coordinator::{ListLocksPage, ListLocksQuery, LockCoordinator, LockRecord};
pub use error::{Error, Result};
pub use observability::{init_logging, LogFormat};
pub use registry::{MemoryRegistry, RegistryIndex};
pub use s3::S3Backend;
pub use scope::RepoScope;
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend};
pub use transfer::{BatchRequest, BatchResponse, Operation, TransferNegotiator};
