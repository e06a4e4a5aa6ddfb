//! API error types and HTTP response mapping.
//!
//! Error bodies follow the Git LFS protocol shape (`{"message": "..."}`) and
//! are served as `application/vnd.git-lfs+json` like every other protocol
//! response.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use lodestone_core::Error as CoreError;

use crate::routes::GIT_LFS_MEDIA_TYPE;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Git LFS protocol error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    /// Human-readable message (safe for clients).
    pub message: String,
}

/// HTTP API error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Returns an error response for missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Returns an error response for conflicting lock requests.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::to_vec(&ApiErrorBody {
            message: self.message,
        })
        .unwrap_or_else(|_| b"{\"message\":\"internal error\"}".to_vec());

        (
            self.status,
            [(header::CONTENT_TYPE, GIT_LFS_MEDIA_TYPE)],
            body,
        )
            .into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidScope { message } => Self::bad_request(message),
            CoreError::InvalidInput(message) => Self::bad_request(message),
            CoreError::NotFound(message) => Self::not_found(message),
            // Both conflict classes surface with the protocol's canonical
            // message, matching what clients key their retry logic on.
            CoreError::AlreadyLocked { .. } | CoreError::LockConflict { .. } => {
                Self::conflict("already created lock")
            }
            CoreError::Storage { message, .. }
            | CoreError::Serialization { message }
            | CoreError::Internal { message } => Self::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_protocol_message() {
        let err: ApiError = CoreError::LockConflict {
            path: "a.bin".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "already created lock");

        let err: ApiError = CoreError::AlreadyLocked {
            path: "a.bin".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "already created lock");
    }

    #[test]
    fn test_response_uses_lfs_media_type() {
        let response = ApiError::not_found("missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        assert_eq!(content_type, Some(GIT_LFS_MEDIA_TYPE));
    }

    #[test]
    fn test_invalid_scope_is_bad_request() {
        let err: ApiError = CoreError::InvalidScope {
            message: "org cannot be empty".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
