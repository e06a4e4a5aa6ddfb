//! Batch transfer API routes.
//!
//! ## Routes
//!
//! - `POST /{org}/{repo}/objects/batch`  - Negotiate a batch of transfers
//! - `POST /{org}/{repo}/objects/verify` - Post-upload verify callback

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;

use lodestone_core::transfer::{BatchRequest, BatchResponse};
use lodestone_core::RepoScope;

use crate::error::{ApiError, ApiErrorBody};
use crate::routes::LfsJson;
use crate::server::AppState;

/// Negotiate a batch of object transfers.
///
/// Per-object misses and failures are reported inline; the batch as a whole
/// succeeds whenever the request itself is well-formed.
#[utoipa::path(
    post,
    path = "/{org}/{repo}/objects/batch",
    params(
        ("org" = String, Path, description = "Organization"),
        ("repo" = String, Path, description = "Repository")
    ),
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Negotiation result", body = BatchResponse),
        (status = 400, description = "Malformed request", body = ApiErrorBody),
    ),
    tag = "transfer"
)]
pub(crate) async fn batch_objects(
    State(state): State<Arc<AppState>>,
    Path((org, repo)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let scope = RepoScope::new(org, repo)?;
    let request: BatchRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid batch request: {e}")))?;

    tracing::info!(
        scope = %scope,
        operation = ?request.operation,
        objects = request.objects.len(),
        "negotiating batch"
    );

    let response = state.negotiator().negotiate(&scope, &request).await;
    Ok(LfsJson(response))
}

/// Post-upload verify callback.
///
/// Accepted without an enforced contract; conforming clients only need the
/// 200.
#[utoipa::path(
    post,
    path = "/{org}/{repo}/objects/verify",
    params(
        ("org" = String, Path, description = "Organization"),
        ("repo" = String, Path, description = "Repository")
    ),
    responses(
        (status = 200, description = "Verify acknowledged"),
    ),
    tag = "transfer"
)]
pub(crate) async fn verify_objects(
    Path((org, repo)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let scope = RepoScope::new(org, repo)?;
    tracing::debug!(scope = %scope, bytes = body.len(), "object verify acknowledged");
    Ok(StatusCode::OK)
}

/// Creates the batch transfer routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:org/:repo/objects/batch", post(batch_objects))
        .route("/:org/:repo/objects/verify", post(verify_objects))
}
