//! File locking API routes.
//!
//! ## Routes
//!
//! - `POST /{org}/{repo}/locks`             - Create an exclusive lock
//! - `POST /{org}/{repo}/locks/{id}/unlock` - Release a lock
//! - `GET  /{org}/{repo}/locks`             - List locks
//! - `POST /{org}/{repo}/locks/verify`      - Lock verify callback

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use lodestone_core::transfer::RefSpec;
use lodestone_core::{ListLocksQuery, LockRecord, RepoScope};

use crate::error::{ApiError, ApiErrorBody};
use crate::routes::LfsJson;
use crate::server::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create an exclusive lock.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateLockRequest {
    /// Repository-relative path to lock.
    pub path: String,
    /// Ref the lock is taken against (accepted, not used for arbitration).
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<RefSpec>,
}

/// One lock as seen by protocol clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LockView {
    /// Opaque lock identifier.
    pub id: String,
    /// The locked path; absent on a stale release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Grant timestamp; absent on a stale release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
}

impl From<LockRecord> for LockView {
    fn from(record: LockRecord) -> Self {
        Self {
            id: record.id,
            path: record.path,
            locked_at: record.locked_at,
        }
    }
}

/// Response wrapping a single lock.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LockResponse {
    /// The created or released lock.
    pub lock: LockView,
}

/// Query parameters for listing locks.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListLocksParams {
    /// Narrow the listing to paths starting with this prefix.
    pub path: Option<String>,
    /// Restrict the listing to one exact lock id.
    pub id: Option<String>,
    /// Cursor from a previous truncated page.
    pub cursor: Option<String>,
    /// Page size.
    pub limit: Option<usize>,
    /// Ref filter; accepted for protocol compatibility and ignored.
    pub refspec: Option<String>,
}

/// Response for listing locks.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListLocksResponse {
    /// Locks on this page, in registry key order.
    pub locks: Vec<LockView>,
    /// Cursor for the next page, present when truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Response for the lock verify callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VerifyLocksResponse {
    /// Locks held by the requesting client.
    pub ours: Vec<LockView>,
    /// Locks held by other clients.
    pub theirs: Vec<LockView>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Create an exclusive lock on a path.
#[utoipa::path(
    post,
    path = "/{org}/{repo}/locks",
    params(
        ("org" = String, Path, description = "Organization"),
        ("repo" = String, Path, description = "Repository")
    ),
    request_body = CreateLockRequest,
    responses(
        (status = 200, description = "Lock created", body = LockResponse),
        (status = 400, description = "Malformed request", body = ApiErrorBody),
        (status = 409, description = "Path already locked", body = ApiErrorBody),
    ),
    tag = "locks"
)]
pub(crate) async fn create_lock(
    State(state): State<Arc<AppState>>,
    Path((org, repo)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let scope = RepoScope::new(org, repo)?;
    let request: CreateLockRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid lock request: {e}")))?;

    let record = state.coordinator().create(&scope, &request.path).await?;

    Ok(LfsJson(LockResponse {
        lock: record.into(),
    }))
}

/// Release a lock by id.
///
/// Releasing an id that holds no lock succeeds with null fields; clients must
/// treat it as an idempotent release.
#[utoipa::path(
    post,
    path = "/{org}/{repo}/locks/{id}/unlock",
    params(
        ("org" = String, Path, description = "Organization"),
        ("repo" = String, Path, description = "Repository"),
        ("id" = String, Path, description = "Lock id")
    ),
    responses(
        (status = 200, description = "Pre-release lock snapshot", body = LockResponse),
        (status = 400, description = "Malformed lock id", body = ApiErrorBody),
    ),
    tag = "locks"
)]
pub(crate) async fn unlock_lock(
    State(state): State<Arc<AppState>>,
    Path((org, repo, id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = RepoScope::new(org, repo)?;
    let record = state.coordinator().release(&scope, &id).await?;

    Ok(LfsJson(LockResponse {
        lock: record.into(),
    }))
}

/// List locks for a repository.
#[utoipa::path(
    get,
    path = "/{org}/{repo}/locks",
    params(
        ("org" = String, Path, description = "Organization"),
        ("repo" = String, Path, description = "Repository"),
        ListLocksParams
    ),
    responses(
        (status = 200, description = "Lock listing", body = ListLocksResponse),
    ),
    tag = "locks"
)]
pub(crate) async fn list_locks(
    State(state): State<Arc<AppState>>,
    Path((org, repo)): Path<(String, String)>,
    Query(params): Query<ListLocksParams>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = RepoScope::new(org, repo)?;

    if params.refspec.is_some() {
        tracing::debug!(scope = %scope, "refspec filtering not supported; ignoring");
    }

    let query = ListLocksQuery {
        path: params.path,
        id: params.id,
        cursor: params.cursor,
        limit: params.limit,
    };
    let page = state.coordinator().list(&scope, &query).await?;

    Ok(LfsJson(ListLocksResponse {
        locks: page.locks.into_iter().map(LockView::from).collect(),
        next_cursor: page.next_cursor,
    }))
}

/// Lock verify callback.
///
/// Accepted without an enforced contract; returns an empty partition so
/// conforming clients proceed with their push.
#[utoipa::path(
    post,
    path = "/{org}/{repo}/locks/verify",
    params(
        ("org" = String, Path, description = "Organization"),
        ("repo" = String, Path, description = "Repository")
    ),
    responses(
        (status = 200, description = "Verify acknowledged", body = VerifyLocksResponse),
    ),
    tag = "locks"
)]
pub(crate) async fn verify_locks(
    Path((org, repo)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = RepoScope::new(org, repo)?;
    tracing::debug!(scope = %scope, "lock verify acknowledged");
    Ok(LfsJson(VerifyLocksResponse::default()))
}

/// Creates the lock routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:org/:repo/locks", post(create_lock))
        .route("/:org/:repo/locks", get(list_locks))
        .route("/:org/:repo/locks/:id/unlock", post(unlock_lock))
        .route("/:org/:repo/locks/verify", post(verify_locks))
}
