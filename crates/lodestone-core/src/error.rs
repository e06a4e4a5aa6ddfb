//! Error types and result aliases for Lodestone.
//!
//! Errors are structured for programmatic handling: the API layer maps each
//! variant to a protocol status without parsing messages.

/// The result type used throughout Lodestone.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Lodestone operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid repository scope was provided.
    #[error("invalid scope: {message}")]
    InvalidScope {
        /// Description of what made the scope invalid.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A path or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A lock actor was asked to lock while already holding a lock.
    #[error("lock already held for path: {path}")]
    AlreadyLocked {
        /// The path currently held by the actor.
        path: String,
    },

    /// A lock creation found the path already registered.
    #[error("lock conflict for path: {path}")]
    LockConflict {
        /// The path that was requested.
        path: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true when the error represents a lock-ownership conflict.
    ///
    /// Both the registry short-circuit (`LockConflict`) and an actor-level
    /// race loss (`AlreadyLocked`) surface to clients the same way.
    #[must_use]
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, Self::LockConflict { .. } | Self::AlreadyLocked { .. })
    }
}
