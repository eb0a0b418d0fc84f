//! Access logging and HTTP basic authentication

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::Instrument;

use super::AppState;

/// Build the expected `Authorization: Basic` token for the configured
/// credentials
pub(crate) fn basic_auth_token(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{username}:{password}"))
}

/// Reject requests that do not carry the configured credentials
pub(crate) async fn authn(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let Some(token) = header_value.and_then(|value| value.strip_prefix("Basic ")) else {
        return (
            StatusCode::UNAUTHORIZED,
            "Unauthorized. Basic authentication required.",
        )
            .into_response();
    };

    if token.trim() != expected {
        return (
            StatusCode::FORBIDDEN,
            "Forbidden. The username or password is incorrect.",
        )
            .into_response();
    }

    next.run(request).await
}

/// Emit one access-log line per request
pub(crate) async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = short_request_id();

    let method = request.method().clone();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string());

    // Handler logs inherit the request id through the span.
    let span = tracing::info_span!("request", request_id = %request_id);
    let response = next.run(request).instrument(span).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        url = %url,
        status = response.status().as_u16(),
        client = client.as_deref().unwrap_or("none"),
        duration_ms = start.elapsed().as_millis() as u64,
        "Handled request."
    );

    response
}

fn short_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().to_string();
    id.truncate(8);
    id
}
