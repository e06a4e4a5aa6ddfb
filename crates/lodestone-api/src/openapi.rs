//! `OpenAPI` specification generation for `lodestone-api`.
//!
//! The generated spec is served at `/openapi.json` and can be used to
//! generate clients or detect breaking protocol changes in CI.

use utoipa::OpenApi;

/// `OpenAPI` documentation for the Lodestone protocol surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lodestone API",
        version = "0.1.0",
        description = "Git LFS batch transfer and file locking server"
    ),
    paths(
        crate::routes::batch::batch_objects,
        crate::routes::batch::verify_objects,
        crate::routes::locks::create_lock,
        crate::routes::locks::unlock_lock,
        crate::routes::locks::list_locks,
        crate::routes::locks::verify_locks,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::routes::locks::CreateLockRequest,
            crate::routes::locks::LockView,
            crate::routes::locks::LockResponse,
            crate::routes::locks::ListLocksResponse,
            crate::routes::locks::VerifyLocksResponse,
            lodestone_core::transfer::BatchRequest,
            lodestone_core::transfer::BatchResponse,
            lodestone_core::transfer::ObjectSpec,
            lodestone_core::transfer::ObjectResult,
            lodestone_core::transfer::ObjectActions,
            lodestone_core::transfer::ObjectAction,
            lodestone_core::transfer::ObjectError,
            lodestone_core::transfer::Operation,
            lodestone_core::transfer::RefSpec,
        )
    ),
    tags(
        (name = "transfer", description = "Batch transfer negotiation"),
        (name = "locks", description = "Exclusive file locks"),
    )
)]
pub struct ApiDoc;

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
