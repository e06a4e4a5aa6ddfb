//! API integration tests.
//!
//! Tests the complete request flow: HTTP → routes → coordinator/negotiator →
//! storage.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use bytes::Bytes;
use tower::ServiceExt;

use lodestone_api::server::ServerBuilder;
use lodestone_core::storage::{MemoryBackend, StorageBackend};

const GIT_LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

const OID_A: &str = "aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11";
const OID_B: &str = "bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22";
const OID_C: &str = "cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33";

fn test_router() -> axum::Router {
    ServerBuilder::new().debug(true).build().test_router()
}

fn test_router_with_backend(backend: Arc<dyn StorageBackend>) -> axum::Router {
    ServerBuilder::new()
        .debug(true)
        .storage_backend(backend)
        .build()
        .test_router()
}

mod helpers {
    use super::*;

    pub fn make_request(
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, GIT_LFS_MEDIA_TYPE);

        let body = match body {
            Some(v) => Body::from(serde_json::to_vec(&v).expect("serialize request body")),
            None => Body::empty(),
        };

        builder.body(body).expect("build request")
    }

    pub async fn send(
        router: &axum::Router,
        request: Request<Body>,
    ) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("route request");
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
            .await
            .expect("read response body");
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|e| {
                panic!(
                    "parse JSON response (status={status}): {e}: {}",
                    String::from_utf8_lossy(&body)
                )
            })
        };
        (status, content_type, json)
    }

    pub async fn post_json(
        router: &axum::Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let (status, _, json) = send(router, make_request(Method::POST, uri, Some(body))).await;
        (status, json)
    }

    pub async fn get_json(router: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, _, json) = send(router, make_request(Method::GET, uri, None)).await;
        (status, json)
    }

    pub fn batch_body(operation: &str, oids: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "operation": operation,
            "transfers": ["basic"],
            "objects": oids
                .iter()
                .map(|oid| serde_json::json!({"oid": oid, "size": 123}))
                .collect::<Vec<_>>(),
        })
    }
}

use helpers::{batch_body, get_json, make_request, post_json, send};

// ============================================================================
// Batch transfer
// ============================================================================

#[tokio::test]
async fn test_upload_always_granted_with_protocol_window() {
    let router = test_router();

    let (status, body) = post_json(
        &router,
        "/org1/repoA/objects/batch",
        batch_body("upload", &[OID_A]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transfer"], "basic");
    let upload = &body["objects"][0]["actions"]["upload"];
    assert!(upload["href"].as_str().is_some_and(|h| !h.is_empty()));
    assert_eq!(upload["expires_in"], 3600);
    assert!(body["objects"][0].get("error").is_none());
}

#[tokio::test]
async fn test_batch_response_uses_lfs_media_type() {
    let router = test_router();

    let (status, content_type, _) = send(
        &router,
        make_request(
            Method::POST,
            "/org1/repoA/objects/batch",
            Some(batch_body("upload", &[OID_A])),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(GIT_LFS_MEDIA_TYPE));
}

#[tokio::test]
async fn test_download_miss_reports_per_object_404() {
    let router = test_router();

    let (status, body) = post_json(
        &router,
        "/org1/repoA/objects/batch",
        batch_body("download", &[OID_A]),
    )
    .await;

    // Per-object misses never fail the batch as a whole.
    assert_eq!(status, StatusCode::OK);
    let object = &body["objects"][0];
    assert_eq!(object["error"]["code"], 404);
    assert_eq!(object["error"]["message"], "object not found");
    assert!(object.get("actions").is_none());
}

#[tokio::test]
async fn test_download_preserves_request_order() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    backend
        .put(&format!("org1/repoA/{OID_B}"), Bytes::from("content"))
        .await
        .expect("seed object");
    let router = test_router_with_backend(backend);

    let (status, body) = post_json(
        &router,
        "/org1/repoA/objects/batch",
        batch_body("download", &[OID_A, OID_B, OID_C]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let objects = body["objects"].as_array().expect("objects array");
    assert_eq!(objects.len(), 3);
    assert_eq!(objects[0]["oid"], OID_A);
    assert_eq!(objects[1]["oid"], OID_B);
    assert_eq!(objects[2]["oid"], OID_C);
    assert_eq!(objects[0]["error"]["code"], 404);
    assert!(objects[1]["actions"]["download"]["href"].is_string());
    assert_eq!(objects[2]["error"]["code"], 404);
}

#[tokio::test]
async fn test_invalid_oid_rejected_per_object() {
    let router = test_router();

    let (status, body) = post_json(
        &router,
        "/org1/repoA/objects/batch",
        batch_body("upload", &["../escape"]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["objects"][0]["error"]["code"], 422);
}

#[tokio::test]
async fn test_unknown_operation_is_bad_request() {
    let router = test_router();

    let (status, body) = post_json(
        &router,
        "/org1/repoA/objects/batch",
        batch_body("delete", &[OID_A]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn test_object_verify_is_accepted() {
    let router = test_router();

    let (status, _) = post_json(
        &router,
        "/org1/repoA/objects/verify",
        serde_json::json!({"oid": OID_A, "size": 123}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Wrapper whose existence checks fail, simulating an unreachable store.
mod failing {
    use super::*;
    use async_trait::async_trait;
    use lodestone_core::storage::ObjectMeta;
    use lodestone_core::{Error, Result};
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub struct HeadFailsBackend {
        inner: MemoryBackend,
    }

    #[async_trait]
    impl StorageBackend for HeadFailsBackend {
        async fn get(&self, path: &str) -> Result<Bytes> {
            self.inner.get(path).await
        }
        async fn put(&self, path: &str, data: Bytes) -> Result<()> {
            self.inner.put(path, data).await
        }
        async fn delete(&self, path: &str) -> Result<()> {
            self.inner.delete(path).await
        }
        async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
            if path.starts_with("__lodestone/") {
                return self.inner.head(path).await;
            }
            Err(Error::storage("connection refused"))
        }
        async fn signed_upload_url(
            &self,
            path: &str,
            content_length: u64,
            expiry: Duration,
        ) -> Result<String> {
            self.inner.signed_upload_url(path, content_length, expiry).await
        }
        async fn signed_download_url(&self, path: &str, expiry: Duration) -> Result<String> {
            self.inner.signed_download_url(path, expiry).await
        }
    }
}

#[tokio::test]
async fn test_transport_failure_is_not_reported_as_miss() {
    let router = test_router_with_backend(Arc::new(failing::HeadFailsBackend::default()));

    let (status, body) = post_json(
        &router,
        "/org1/repoA/objects/batch",
        batch_body("download", &[OID_A]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let error = &body["objects"][0]["error"];
    assert_eq!(error["code"], 500);
    assert_eq!(error["message"], "object storage unavailable");
}

// ============================================================================
// Locks
// ============================================================================

#[tokio::test]
async fn test_lock_lifecycle() {
    let router = test_router();

    // Create succeeds with a full record.
    let (status, body) = post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "assets/tex.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["lock"]["id"].as_str().expect("lock id").to_string();
    assert_eq!(body["lock"]["path"], "assets/tex.png");
    let locked_at = body["lock"]["locked_at"]
        .as_str()
        .expect("locked_at")
        .to_string();

    // An identical create is a conflict with the canonical message.
    let (status, body) = post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "assets/tex.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "already created lock");

    // Release returns the pre-release snapshot.
    let (status, body) = post_json(
        &router,
        &format!("/org1/repoA/locks/{id}/unlock"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lock"]["id"], id.as_str());
    assert_eq!(body["lock"]["path"], "assets/tex.png");
    assert_eq!(body["lock"]["locked_at"], locked_at.as_str());

    // The path can be locked again after release.
    let (status, body) = post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "assets/tex.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["lock"]["locked_at"].as_str().is_some());
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let router = test_router();

    let (_, body) = post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "a.bin"}),
    )
    .await;
    let id = body["lock"]["id"].as_str().expect("lock id").to_string();

    let unlock_uri = format!("/org1/repoA/locks/{id}/unlock");
    let (status, _) = post_json(&router, &unlock_uri, serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // Second release succeeds with null fields.
    let (status, body) = post_json(&router, &unlock_uri, serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lock"]["id"], id.as_str());
    assert!(body["lock"].get("path").is_none());
    assert!(body["lock"].get("locked_at").is_none());
}

#[tokio::test]
async fn test_create_lock_rejects_traversal_paths() {
    let router = test_router();

    let (status, _) = post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "../outside.bin"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_locks_is_scoped_to_repo() {
    let router = test_router();

    let (status, _) = post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "a/x.bin"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_json(
        &router,
        "/org1/repoB/locks",
        serde_json::json!({"path": "a/y.bin"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_json(&router, "/org1/repoA/locks").await;
    assert_eq!(status, StatusCode::OK);
    let locks = body["locks"].as_array().expect("locks array");
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0]["path"], "a/x.bin");
    assert!(locks[0]["locked_at"].as_str().is_some());
}

#[tokio::test]
async fn test_list_locks_paginates() {
    let router = test_router();

    for path in ["a.bin", "b.bin", "c.bin"] {
        let (status, _) = post_json(
            &router,
            "/org1/repoA/locks",
            serde_json::json!({"path": path}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = get_json(&router, "/org1/repoA/locks?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locks"].as_array().expect("locks").len(), 2);
    let cursor = body["next_cursor"].as_str().expect("cursor").to_string();

    let (status, body) = get_json(
        &router,
        &format!("/org1/repoA/locks?limit=2&cursor={}", urlencode(&cursor)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locks"].as_array().expect("locks").len(), 1);
    assert_eq!(body["locks"][0]["path"], "c.bin");
    assert!(body.get("next_cursor").is_none());
}

#[tokio::test]
async fn test_list_locks_filters_by_path_and_id() {
    let router = test_router();

    let (_, created) = post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "a/x.bin"}),
    )
    .await;
    let id = created["lock"]["id"].as_str().expect("id").to_string();
    post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "b/y.bin"}),
    )
    .await;

    let (status, body) = get_json(&router, "/org1/repoA/locks?path=a/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locks"].as_array().expect("locks").len(), 1);
    assert_eq!(body["locks"][0]["path"], "a/x.bin");

    let (status, body) = get_json(&router, &format!("/org1/repoA/locks?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locks"].as_array().expect("locks").len(), 1);
    assert_eq!(body["locks"][0]["id"], id.as_str());
}

#[tokio::test]
async fn test_lock_verify_is_accepted() {
    let router = test_router();

    let (status, body) = post_json(&router, "/org1/repoA/locks/verify", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ours"].as_array().is_some_and(Vec::is_empty));
    assert!(body["theirs"].as_array().is_some_and(Vec::is_empty));
}

#[tokio::test]
async fn test_locks_survive_storage_backed_restart() {
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let router = test_router_with_backend(Arc::clone(&backend));

    let (status, body) = post_json(
        &router,
        "/org1/repoA/locks",
        serde_json::json!({"path": "a.bin"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["lock"]["id"].as_str().expect("id").to_string();
    let locked_at = body["lock"]["locked_at"].as_str().expect("ts").to_string();

    // A new router over the same storage simulates a process restart. The
    // registry is process-local, so the actor is the authority here: a
    // release addressed by id still returns the durable pre-release state.
    let restarted = test_router_with_backend(backend);
    let (status, body) = post_json(
        &restarted,
        &format!("/org1/repoA/locks/{id}/unlock"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lock"]["path"], "a.bin");
    assert_eq!(body["lock"]["locked_at"], locked_at.as_str());
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .flat_map(|b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                vec![b as char]
            } else {
                format!("%{b:02X}").chars().collect()
            }
        })
        .collect()
}
