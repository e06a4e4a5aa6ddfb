//! API server implementation.
//!
//! Provides health, ready, and protocol endpoints for the Lodestone server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use lodestone_core::storage::{MemoryBackend, StorageBackend};
use lodestone_core::{
    Error, LockActorPool, LockCoordinator, MemoryRegistry, RegistryIndex, Result,
    TransferNegotiator,
};

use crate::config::Config;

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    storage: Arc<dyn StorageBackend>,
    coordinator: LockCoordinator,
    negotiator: TransferNegotiator,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates new application state over the given storage and registry.
    #[must_use]
    pub fn new(
        config: Config,
        storage: Arc<dyn StorageBackend>,
        registry: Arc<dyn RegistryIndex>,
    ) -> Self {
        let coordinator = LockCoordinator::new(registry, LockActorPool::new(Arc::clone(&storage)));
        let negotiator = TransferNegotiator::new(Arc::clone(&storage), config.url_expiry());
        Self {
            config,
            storage,
            coordinator,
            negotiator,
        }
    }

    /// Returns the lock coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &LockCoordinator {
        &self.coordinator
    }

    /// Returns the transfer negotiator.
    #[must_use]
    pub fn negotiator(&self) -> &TransferNegotiator {
        &self.negotiator
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn storage_backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.storage)
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check
/// that doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Returns 200 OK if the service is ready to accept requests.
/// A `HEAD` on a missing key is sufficient to validate credentials and the
/// network path without listing the bucket.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check_key = "__lodestone/ready-check";
    match state.storage_backend().head(check_key).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("storage check failed: {e}")),
            }),
        ),
    }
}

/// Serves the generated OpenAPI document.
async fn openapi_spec() -> impl IntoResponse {
    Json(crate::openapi::spec())
}

// ============================================================================
// Server
// ============================================================================

/// The Lodestone API server.
pub struct Server {
    config: Config,
    storage: Arc<dyn StorageBackend>,
    registry: Arc<dyn RegistryIndex>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .field("registry", &"<RegistryIndex>")
            .finish()
    }
}

impl Server {
    /// Creates a new server with the given configuration.
    ///
    /// Defaults to in-memory storage and registry; use the builder for
    /// production wiring.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            storage: Arc::new(MemoryBackend::new()),
            registry: Arc::new(MemoryRegistry::new()),
        }
    }

    /// Creates a new `ServerBuilder`.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        let state = Arc::new(AppState::new(
            self.config.clone(),
            Arc::clone(&self.storage),
            Arc::clone(&self.registry),
        ));

        Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/openapi.json", get(openapi_spec))
            .merge(crate::routes::protocol_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the server cannot
    /// bind to the port.
    pub async fn serve(&self) -> Result<()> {
        self.validate_config()?;

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.create_router();

        tracing::info!(
            http_port = self.config.http_port,
            url_expiry_secs = self.config.url_expiry_secs,
            "Starting Lodestone API server"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal {
                message: format!("failed to bind to {addr}: {e}"),
            })?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal {
                message: format!("server error: {e}"),
            })?;

        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// This is useful for integration tests where you want to exercise the
    /// routes without binding to a port.
    #[doc(hidden)]
    #[must_use]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }

    fn validate_config(&self) -> Result<()> {
        if !self.config.debug && self.config.storage.bucket.is_none() {
            return Err(Error::InvalidInput(
                "storage.bucket is required when debug=false".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a server.
pub struct ServerBuilder {
    config: Config,
    storage: Arc<dyn StorageBackend>,
    registry: Arc<dyn RegistryIndex>,
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("storage", &"<StorageBackend>")
            .field("registry", &"<RegistryIndex>")
            .finish()
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            storage: Arc::new(MemoryBackend::new()),
            registry: Arc::new(MemoryRegistry::new()),
        }
    }
}

impl ServerBuilder {
    /// Creates a new server builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entire configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the HTTP port.
    #[must_use]
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.http_port = port;
        self
    }

    /// Enables debug mode.
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Sets the presigned URL validity window in seconds.
    #[must_use]
    pub fn url_expiry_secs(mut self, secs: u64) -> Self {
        self.config.url_expiry_secs = secs;
        self
    }

    /// Sets the storage backend used by request handlers.
    ///
    /// By default, the server uses an in-memory backend intended only for
    /// tests and debug deployments.
    #[must_use]
    pub fn storage_backend(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = storage;
        self
    }

    /// Sets the lock registry index.
    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn RegistryIndex>) -> Self {
        self.registry = registry;
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config,
            storage: self.storage,
            registry: self.registry,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
