//! The HTTP server wiring

mod api;
mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;

use tfhttp_state::{LockBackend, StorageBackend};

use crate::config::Config;

pub(crate) use middleware::basic_auth_token;

/// Shared state handed to every handler
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub locks: Arc<dyn LockBackend>,
    /// Expected basic-auth token; `None` disables authentication
    pub auth_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) fn response_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Build the application router
///
/// The lock and unlock routes are registered above the state wildcard so
/// their static prefixes take priority; everything after the prefix is the
/// state id and may contain slashes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(api::health))
        .route("/state/lock/*id", post(api::lock_state))
        .route("/state/unlock/*id", post(api::unlock_state))
        .route(
            "/state/*id",
            get(api::get_state)
                .post(api::put_state)
                .delete(api::delete_state),
        );

    if state.auth_token.is_some() {
        router = router.layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authn,
        ));
    }

    router
        .layer(axum::middleware::from_fn(middleware::access_log))
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn run_server(config: &Config, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
