//! The HTTP state API handlers
//!
//! Five operations map onto the Terraform/OpenTofu HTTP backend contract:
//! fetch, create/overwrite and delete a state blob, and acquire/release
//! its advisory lock. Backend outcomes translate into the status codes
//! the reference client expects: 404 for a missing blob, 409 with the
//! holder's record for lock contention, 502 when the object store is
//! unreachable, 400 when stored bytes do not decode as a state document.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sha2::{Digest, Sha256};

use tfhttp_state::{LockError, LockInfo, StateDocument, StorageError};

use super::{AppState, response_error};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Fetch the state by its ID
pub(crate) async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(state_id): Path<String>,
) -> Response {
    tracing::info!(state_id = %state_id, "Fetching state.");

    let blob = match state.storage.get(&state_id).await {
        Ok(blob) => blob,
        Err(StorageError::NotFound(_)) => {
            return response_error(
                StatusCode::NOT_FOUND,
                format!("The state with ID {state_id} not found."),
            );
        }
        Err(err) => {
            tracing::error!(state_id = %state_id, error = %err, "Storage backend error.");
            return response_error(StatusCode::BAD_GATEWAY, err.to_string());
        }
    };

    // Writes are accepted verbatim, so decoding can fail here even though
    // the blob was stored successfully.
    match serde_json::from_slice::<StateDocument>(&blob) {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(err) => {
            tracing::warn!(state_id = %state_id, error = %err, "Stored state does not decode.");
            response_error(
                StatusCode::BAD_REQUEST,
                format!("The {state_id} state does not decode: {err}"),
            )
        }
    }
}

/// Create or overwrite the state by its ID
pub(crate) async fn put_state(
    State(state): State<Arc<AppState>>,
    Path(state_id): Path<String>,
    body: Bytes,
) -> Response {
    // The digest is recorded for the audit trail only; nothing verifies it
    // on read.
    let digest = hex::encode(Sha256::digest(&body));
    tracing::info!(
        state_id = %state_id,
        size = body.len(),
        sha256 = %digest,
        "Creating state."
    );

    match state.storage.create(&state_id, &body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            tracing::error!(state_id = %state_id, error = %err, "Storage backend error.");
            response_error(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

/// Delete the state by its ID
pub(crate) async fn delete_state(
    State(state): State<Arc<AppState>>,
    Path(state_id): Path<String>,
) -> Response {
    tracing::info!(state_id = %state_id, "Deleting state.");

    match state.storage.delete(&state_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(StorageError::NotFound(_)) => response_error(
            StatusCode::NOT_FOUND,
            format!("The state with ID {state_id} not found."),
        ),
        Err(err) => {
            tracing::error!(state_id = %state_id, error = %err, "Storage backend error.");
            response_error(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

/// Lock the state by its ID
pub(crate) async fn lock_state(
    State(state): State<Arc<AppState>>,
    Path(state_id): Path<String>,
    Json(info): Json<LockInfo>,
) -> Response {
    tracing::info!(state_id = %state_id, lock_id = %info.id, who = %info.who, "Locking state.");

    match state.locks.lock(&state_id, &info).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(LockError::AlreadyLocked(holder)) => {
            tracing::info!(state_id = %state_id, holder = %holder.id, "State already locked.");
            (StatusCode::CONFLICT, Json(holder)).into_response()
        }
        Err(err) => {
            tracing::error!(state_id = %state_id, error = %err, "Lock backend error.");
            response_error(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

/// Unlock the state by its ID
///
/// The request body is ignored: the reference client's unlock request for
/// HTTP backends does not carry the lock id, so whichever record is
/// present is removed and returned.
pub(crate) async fn unlock_state(
    State(state): State<Arc<AppState>>,
    Path(state_id): Path<String>,
) -> Response {
    tracing::info!(state_id = %state_id, "Unlocking state.");

    match state.locks.unlock(&state_id).await {
        Ok(removed) => (StatusCode::OK, Json(removed)).into_response(),
        Err(LockError::NotLocked(_)) => response_error(
            StatusCode::CONFLICT,
            format!("The {state_id} lock not acquired."),
        ),
        Err(err) => {
            tracing::error!(state_id = %state_id, error = %err, "Lock backend error.");
            response_error(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use tfhttp_state::backends::{MemoryLockBackend, MemoryStorageBackend};

    use crate::server::{AppState, basic_auth_token, build_router};

    fn test_router(auth_token: Option<String>) -> Router {
        let storage = MemoryStorageBackend::new();
        let locks = MemoryLockBackend::new(storage.clone());
        build_router(Arc::new(AppState {
            storage: Arc::new(storage),
            locks: Arc::new(locks),
            auth_token,
        }))
    }

    async fn send(
        router: &Router,
        method: &str,
        path: &str,
        body: &str,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, value)
    }

    fn sample_state() -> String {
        serde_json::json!({
            "version": 4,
            "terraform_version": "1.9.0",
            "serial": 1,
            "lineage": "3f8a6f4d-0f6b-4f6a-9d9b-2f4f0e8d7c11",
            "outputs": {},
            "resources": []
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let router = test_router(None);
        let (status, body) = send(&router, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_state_round_trip() {
        let router = test_router(None);

        let (status, _) = send(&router, "POST", "/state/s1", &sample_state()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&router, "GET", "/state/s1", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::from_str::<serde_json::Value>(&sample_state()).unwrap());

        let (status, _) = send(&router, "DELETE", "/state/s1", "").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&router, "GET", "/state/s1", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_missing_state() {
        let router = test_router(None);
        let (status, _) = send(&router, "GET", "/state/never-created", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_missing_state() {
        let router = test_router(None);
        let (status, _) = send(&router, "DELETE", "/state/never-created", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_undecodable_state() {
        let router = test_router(None);

        // Writes are verbatim, so junk is accepted...
        let (status, _) = send(&router, "POST", "/state/s1", "not a state document").await;
        assert_eq!(status, StatusCode::OK);

        // ...and only rejected when read back.
        let (status, _) = send(&router, "GET", "/state/s1", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_state_id_with_slashes() {
        let router = test_router(None);

        let path = "/state/envs/prod/terraform.tfstate";
        let (status, _) = send(&router, "POST", path, &sample_state()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&router, "GET", path, "").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_lock_contention_flow() {
        let router = test_router(None);

        let (status, _) = send(
            &router,
            "POST",
            "/state/lock/s1",
            r#"{"ID":"L1","Who":"a"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The second locker is told who holds the lock.
        let (status, body) = send(
            &router,
            "POST",
            "/state/lock/s1",
            r#"{"ID":"L2","Who":"b"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["ID"], "L1");
        assert_eq!(body["Who"], "a");

        let (status, body) = send(&router, "POST", "/state/unlock/s1", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ID"], "L1");

        let (status, _) = send(&router, "POST", "/state/unlock/s1", "").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unlock_ignores_request_body() {
        let router = test_router(None);

        let (status, _) = send(
            &router,
            "POST",
            "/state/lock/s1",
            r#"{"ID":"L1","Who":"a"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // A mismatched id in the body changes nothing: the present record
        // is removed and returned.
        let (status, body) = send(
            &router,
            "POST",
            "/state/unlock/s1",
            r#"{"ID":"not-the-holder"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ID"], "L1");
    }

    #[tokio::test]
    async fn test_lock_and_state_are_independent() {
        let router = test_router(None);

        // Locking a state id with no blob succeeds.
        let (status, _) = send(
            &router,
            "POST",
            "/state/lock/s1",
            r#"{"ID":"L1","Who":"a"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Deleting the blob does not release the lock.
        let (status, _) = send(&router, "POST", "/state/s1", &sample_state()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&router, "DELETE", "/state/s1", "").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &router,
            "POST",
            "/state/lock/s1",
            r#"{"ID":"L2","Who":"b"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["ID"], "L1");
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let token = basic_auth_token("admin", "secret");
        let router = test_router(Some(token.clone()));

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .header(header::AUTHORIZATION, "Basic bm90OnRoaXM=")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .header(header::AUTHORIZATION, format!("Basic {token}"))
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
