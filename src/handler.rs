use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::{
    AddBookmarkRequest, AddBookmarkResponse, AddCrawlRequest, AddCrawlResponse, HealthResponse,
    PendingCrawlsResponse, PendingParams,
};
use crate::bookmarks::BookmarkStore;
use crate::config::Queue;
use crate::error::ArchiveError;
use crate::middleware::VERSION;
use crate::queue::CrawlQueue;
use crate::store::Store;

pub const PUBLISH_TAG: &str = "publish";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub bookmarks: BookmarkStore,
    pub queue: CrawlQueue,
    pub lease_batch_size: usize,
    pub lease_staleness: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, queue_cfg: &Queue) -> Self {
        AppState {
            bookmarks: BookmarkStore::new(store.clone()),
            queue: CrawlQueue::new(store.clone()),
            lease_batch_size: queue_cfg.lease_batch_size.max(1),
            lease_staleness: queue_cfg.staleness(),
            store,
        }
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
    })
}

fn invalid_request(rejection: impl std::fmt::Display) -> Response {
    tracing::debug!(error = %rejection, "rejected request");
    ArchiveError::validation("invalid request").into_response()
}

pub async fn add_bookmarks(
    State(state): State<AppState>,
    payload: Result<Json<AddBookmarkRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rejection) => return invalid_request(rejection),
    };

    match state.bookmarks.add(payload.bookmarks).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(AddBookmarkResponse {
                status: "ok".to_string(),
                inserted: summary.inserted,
                skipped: summary.skipped,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn add_crawl(
    State(state): State<AppState>,
    payload: Result<Json<AddCrawlRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rejection) => return invalid_request(rejection),
    };

    match state.queue.complete(&payload.url, payload.title, payload.body).await {
        Ok(title_filled) => {
            tracing::info!(url = %payload.url, title_filled, "crawl recorded");
            (
                StatusCode::OK,
                Json(AddCrawlResponse {
                    status: "ok".to_string(),
                    title_filled,
                }),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn pending_crawls(
    State(state): State<AppState>,
    params: Result<Query<PendingParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return invalid_request(rejection),
    };

    let count = params
        .limit
        .unwrap_or(state.lease_batch_size)
        .clamp(1, state.lease_batch_size);

    match state.queue.lease(count, state.lease_staleness).await {
        Ok(urls) => (StatusCode::OK, Json(PendingCrawlsResponse { urls })).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn public_bookmarks(State(state): State<AppState>) -> Response {
    match state.store.tagged_bookmarks(PUBLISH_TAG).await {
        Ok(bookmarks) => (StatusCode::OK, Json(bookmarks)).into_response(),
        Err(e) => ArchiveError::storage("error getting public bookmarks", e).into_response(),
    }
}
