//! Repository scoping primitives.
//!
//! Every piece of Lodestone state is partitioned by a `(org, repo)` pair:
//! - **Object keys**: `{org}/{repo}/{oid}` in the object store
//! - **Registry keys**: `{org}:{repo}:{path}` in the lock registry index
//! - **Actor names**: `{org}/{repo}/{path}`, hashed into the actor id
//!
//! Identifiers are validated at construction so no request-supplied value can
//! escape its scope through path separators or traversal sequences.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length for org and repo identifiers.
const MAX_ID_LEN: usize = 100;

/// Maximum length for a lock path.
const MAX_PATH_LEN: usize = 1024;

/// The `(organization, repository)` pair partitioning the lock namespace and
/// the object-storage key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoScope {
    org: String,
    repo: String,
}

impl RepoScope {
    /// Creates a new scope after validating both identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if either identifier is empty, too long, or contains
    /// characters outside the allowed set.
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        let org = org.into();
        let repo = repo.into();

        Self::validate_org(&org)?;
        Self::validate_repo(&repo)?;

        Ok(Self { org, repo })
    }

    /// Returns the organization identifier.
    #[must_use]
    pub fn org(&self) -> &str {
        &self.org
    }

    /// Returns the repository identifier.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Returns the object-store key for a content-addressed object.
    #[must_use]
    pub fn object_key(&self, oid: &str) -> String {
        format!("{}/{}/{oid}", self.org, self.repo)
    }

    /// Returns the registry key for a lock path.
    #[must_use]
    pub fn registry_key(&self, path: &str) -> String {
        format!("{}:{}:{path}", self.org, self.repo)
    }

    /// Returns the registry scan prefix, optionally narrowed by a path prefix.
    ///
    /// The trailing separator is part of the prefix so `repo` never matches
    /// `repo-x` entries.
    #[must_use]
    pub fn registry_prefix(&self, path_filter: Option<&str>) -> String {
        match path_filter {
            Some(filter) => format!("{}:{}:{filter}", self.org, self.repo),
            None => format!("{}:{}:", self.org, self.repo),
        }
    }

    /// Returns the name from which this scope's lock actors derive their ids.
    #[must_use]
    pub fn actor_name(&self, path: &str) -> String {
        format!("{}/{}/{path}", self.org, self.repo)
    }

    /// Validates an organization identifier.
    ///
    /// Orgs are ASCII alphanumeric plus hyphens, with no leading or trailing
    /// hyphen. Underscores and dots are deliberately excluded so reserved
    /// storage prefixes (`__lodestone/`, `_locks/`) can never collide with a
    /// scope's object keys.
    fn validate_org(org: &str) -> Result<()> {
        if org.is_empty() {
            return Err(Error::InvalidScope {
                message: "org cannot be empty".to_string(),
            });
        }
        if org.len() > MAX_ID_LEN {
            return Err(Error::InvalidScope {
                message: format!("org '{org}' is too long (maximum {MAX_ID_LEN} characters)"),
            });
        }
        if !org.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidScope {
                message: format!(
                    "org '{org}' contains invalid characters (allowed: letters, digits, '-')"
                ),
            });
        }
        if org.starts_with('-') || org.ends_with('-') {
            return Err(Error::InvalidScope {
                message: format!("org '{org}' cannot start or end with a hyphen"),
            });
        }
        Ok(())
    }

    /// Validates a repository identifier.
    fn validate_repo(repo: &str) -> Result<()> {
        if repo.is_empty() {
            return Err(Error::InvalidScope {
                message: "repo cannot be empty".to_string(),
            });
        }
        if repo.len() > MAX_ID_LEN {
            return Err(Error::InvalidScope {
                message: format!("repo '{repo}' is too long (maximum {MAX_ID_LEN} characters)"),
            });
        }
        if !repo
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(Error::InvalidScope {
                message: format!(
                    "repo '{repo}' contains invalid characters (allowed: letters, digits, '-', '_', '.')"
                ),
            });
        }
        if repo == "." || repo == ".." {
            return Err(Error::InvalidScope {
                message: format!("repo '{repo}' is reserved"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RepoScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// Validates a lock path supplied by a client.
///
/// Lock paths are repository-relative file paths: no absolute paths, no
/// backslashes, no control characters, no `.`/`..` segments.
///
/// # Errors
///
/// Returns `Error::InvalidInput` describing the first violation found.
pub fn validate_lock_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidInput("lock path cannot be empty".to_string()));
    }

    if path.len() > MAX_PATH_LEN {
        return Err(Error::InvalidInput(format!(
            "lock path is too long (maximum {MAX_PATH_LEN} characters)"
        )));
    }

    if path.starts_with('/') {
        return Err(Error::InvalidInput(format!(
            "absolute paths not allowed: {path}"
        )));
    }

    if path.contains('\\') {
        return Err(Error::InvalidInput(format!(
            "backslashes not allowed in paths: {path}"
        )));
    }

    if path.contains('\n') || path.contains('\r') || path.contains('\0') {
        return Err(Error::InvalidInput(format!(
            "control characters not allowed in paths: {path}"
        )));
    }

    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(Error::InvalidInput(format!(
                "path traversal not allowed: {path}"
            )));
        }
    }

    Ok(())
}
