//! # lodestone-api
//!
//! HTTP composition layer for Lodestone, a Git LFS batch-transfer and
//! file-locking server.
//!
//! This crate is a **thin composition layer** with no domain policy. All lock
//! coordination and transfer negotiation lives in `lodestone-core`; this
//! crate handles routing, request/response shaping, and process wiring.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /health                            - Health check
//! GET  /ready                             - Readiness check
//! GET  /openapi.json                      - OpenAPI document
//! POST /{org}/{repo}/objects/batch        - Batch transfer negotiation
//! POST /{org}/{repo}/objects/verify       - Object verify callback
//! POST /{org}/{repo}/locks                - Create lock
//! POST /{org}/{repo}/locks/{id}/unlock    - Release lock
//! GET  /{org}/{repo}/locks                - List locks
//! POST /{org}/{repo}/locks/verify         - Lock verify callback
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use lodestone_api::server::Server;
//!
//! let server = Server::builder()
//!     .http_port(8080)
//!     .debug(true)
//!     .build();
//!
//! server.serve().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::Server;
}
