//! Batch transfer negotiation: wire contracts and per-object decisions.
//!
//! Given a list of content-addressed objects and an operation, the negotiator
//! decides per object whether to hand back a presigned credential or an
//! inline error. Per-object failures never fail the batch; partial success is
//! the norm for this protocol.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::scope::RepoScope;
use crate::storage::StorageBackend;

/// The only transfer adapter this server negotiates.
pub const TRANSFER_BASIC: &str = "basic";

/// Default validity window for presigned credentials.
pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(3600);

/// Maximum accepted oid length (covers sha512 with headroom).
const MAX_OID_LEN: usize = 128;

/// Requested batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Client wants to write objects to the store.
    Upload,
    /// Client wants to read objects from the store.
    Download,
}

/// A ref hint attached to batch or lock requests.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefSpec {
    /// Fully-qualified ref name (e.g. `refs/heads/main`).
    pub name: String,
}

/// One requested object.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ObjectSpec {
    /// Content hash identifying the object.
    pub oid: String,
    /// Object size in bytes.
    pub size: u64,
    /// Whether the client holds an authenticated session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
}

/// A batch transfer request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchRequest {
    /// Requested operation.
    pub operation: Operation,
    /// Transfer adapters the client supports.
    #[serde(default)]
    pub transfers: Vec<String>,
    /// Ref the objects belong to.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<RefSpec>,
    /// The objects to negotiate.
    pub objects: Vec<ObjectSpec>,
    /// Hash algorithm used for oids.
    #[serde(default = "default_hash_algo")]
    pub hash_algo: String,
}

fn default_hash_algo() -> String {
    "sha256".to_string()
}

/// One presigned action the client may perform.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ObjectAction {
    /// Presigned URL to issue the transfer against.
    pub href: String,
    /// Validity window in seconds.
    pub expires_in: u64,
}

/// Actions granted for one object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ObjectActions {
    /// Write credential, present for upload grants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<ObjectAction>,
    /// Read credential, present for download grants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<ObjectAction>,
}

/// Inline per-object error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ObjectError {
    /// Protocol status code for this object.
    pub code: u16,
    /// Human-readable message.
    pub message: String,
}

/// Outcome for one object; exactly one of `actions` or `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ObjectResult {
    /// Content hash, echoed from the request.
    pub oid: String,
    /// Object size, echoed from the request.
    pub size: u64,
    /// Whether the client holds an authenticated session, echoed if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
    /// Granted actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<ObjectActions>,
    /// Inline failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ObjectError>,
}

impl ObjectResult {
    fn granted(spec: &ObjectSpec, actions: ObjectActions) -> Self {
        Self {
            oid: spec.oid.clone(),
            size: spec.size,
            authenticated: spec.authenticated,
            actions: Some(actions),
            error: None,
        }
    }

    fn failed(spec: &ObjectSpec, code: u16, message: impl Into<String>) -> Self {
        Self {
            oid: spec.oid.clone(),
            size: spec.size,
            authenticated: spec.authenticated,
            actions: None,
            error: Some(ObjectError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// A batch transfer response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    /// Negotiated transfer adapter; always `basic`.
    pub transfer: String,
    /// Per-object outcomes, in request order.
    pub objects: Vec<ObjectResult>,
}

/// Decides, per requested object, what action (if any) the client may take.
pub struct TransferNegotiator {
    storage: Arc<dyn StorageBackend>,
    url_expiry: Duration,
}

impl std::fmt::Debug for TransferNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferNegotiator")
            .field("url_expiry", &self.url_expiry)
            .finish_non_exhaustive()
    }
}

impl TransferNegotiator {
    /// Creates a negotiator issuing credentials with the given validity
    /// window.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, url_expiry: Duration) -> Self {
        Self {
            storage,
            url_expiry,
        }
    }

    /// Negotiates a batch request.
    ///
    /// Objects are processed independently and in request order; repeated
    /// oids each get their own credential. This never fails as a whole:
    /// every problem is reported inline on the affected object.
    pub async fn negotiate(&self, scope: &RepoScope, request: &BatchRequest) -> BatchResponse {
        let mut objects = Vec::with_capacity(request.objects.len());

        for spec in &request.objects {
            let result = match request.operation {
                Operation::Upload => self.negotiate_upload(scope, spec).await,
                Operation::Download => self.negotiate_download(scope, spec).await,
            };
            objects.push(result);
        }

        BatchResponse {
            transfer: TRANSFER_BASIC.to_string(),
            objects,
        }
    }

    /// Upload is always granted: re-uploading an existing oid is allowed and
    /// no existence check is performed.
    async fn negotiate_upload(&self, scope: &RepoScope, spec: &ObjectSpec) -> ObjectResult {
        if let Some(result) = check_oid(spec) {
            return result;
        }

        let key = scope.object_key(&spec.oid);
        match self
            .storage
            .signed_upload_url(&key, spec.size, self.url_expiry)
            .await
        {
            Ok(href) => ObjectResult::granted(
                spec,
                ObjectActions {
                    upload: Some(ObjectAction {
                        href,
                        expires_in: self.url_expiry.as_secs(),
                    }),
                    download: None,
                },
            ),
            Err(err) => {
                tracing::error!(oid = %spec.oid, error = %err, "failed to sign upload url");
                ObjectResult::failed(spec, 500, "object storage unavailable")
            }
        }
    }

    /// Download requires the object to exist. A confirmed miss is a 404; a
    /// failing existence check is reported as a storage failure, never
    /// conflated with a miss.
    async fn negotiate_download(&self, scope: &RepoScope, spec: &ObjectSpec) -> ObjectResult {
        if let Some(result) = check_oid(spec) {
            return result;
        }

        let key = scope.object_key(&spec.oid);
        let meta = match self.storage.head(&key).await {
            Ok(meta) => meta,
            Err(err) => {
                tracing::error!(oid = %spec.oid, error = %err, "existence check failed");
                return ObjectResult::failed(spec, 500, "object storage unavailable");
            }
        };

        if meta.is_none() {
            return ObjectResult::failed(spec, 404, "object not found");
        }

        match self.storage.signed_download_url(&key, self.url_expiry).await {
            Ok(href) => ObjectResult::granted(
                spec,
                ObjectActions {
                    upload: None,
                    download: Some(ObjectAction {
                        href,
                        expires_in: self.url_expiry.as_secs(),
                    }),
                },
            ),
            Err(err) => {
                tracing::error!(oid = %spec.oid, error = %err, "failed to sign download url");
                ObjectResult::failed(spec, 500, "object storage unavailable")
            }
        }
    }
}

/// Rejects oids that could not have come from a supported content hash
/// before they are interpolated into a storage key.
fn check_oid(spec: &ObjectSpec) -> Option<ObjectResult> {
    let oid = spec.oid.as_str();
    let valid = !oid.is_empty()
        && oid.len() <= MAX_OID_LEN
        && oid.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));

    if valid {
        None
    } else {
        Some(ObjectResult::failed(spec, 422, "invalid object id"))
    }
}
