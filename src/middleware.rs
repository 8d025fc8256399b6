use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ArchiveError;
use crate::handler::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Lets a request through only if it presents a known api key.
pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(key) = bearer_token(&req) else {
        return ArchiveError::Unauthorized("missing auth token").into_response();
    };

    match state.store.api_key_exists(key).await {
        Ok(true) => next.run(req).await,
        Ok(false) => ArchiveError::Unauthorized("invalid auth token").into_response(),
        Err(e) => ArchiveError::storage("error checking auth token", e).into_response(),
    }
}

pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    if path == "/health" {
        return next.run(req).await;
    }

    let started = Instant::now();
    let response = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

pub async fn server_version(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("server-version", HeaderValue::from_static(VERSION));
    response
}
