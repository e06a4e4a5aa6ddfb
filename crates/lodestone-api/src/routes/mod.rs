//! HTTP route handlers.

pub mod batch;
pub mod locks;

use std::sync::Arc;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde::Serialize;

use crate::error::ApiError;
use crate::server::AppState;

/// Media type for every Git LFS protocol request and response body.
pub const GIT_LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// JSON responder serving `application/vnd.git-lfs+json`.
///
/// Protocol clients reject plain `application/json` responses, so every
/// handler in this crate returns its payload through this wrapper.
#[derive(Debug)]
pub struct LfsJson<T>(pub T);

impl<T: Serialize> IntoResponse for LfsJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => ([(header::CONTENT_TYPE, GIT_LFS_MEDIA_TYPE)], body).into_response(),
            Err(err) => {
                ApiError::internal(format!("failed to serialize response: {err}")).into_response()
            }
        }
    }
}

/// Protocol routes (batch transfer + locks).
pub fn protocol_routes() -> Router<Arc<AppState>> {
    Router::new().merge(batch::routes()).merge(locks::routes())
}
