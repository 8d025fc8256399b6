use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::handler::{self, AppState};
use crate::middleware::{log_requests, require_api_key, server_version};

/// Routes that require a bearer api key, mounted under `/api`.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookmark", post(handler::add_bookmarks))
        .route("/crawl", post(handler::add_crawl))
        .route("/crawl/pending", get(handler::pending_crawls))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

pub fn routes(state: AppState, production: bool) -> Router {
    let app = Router::new()
        .route("/health", get(handler::healthcheck))
        .route("/public", get(handler::public_bookmarks))
        .nest("/api", api_routes(state.clone()))
        .layer(middleware::from_fn(log_requests))
        .layer(middleware::from_fn(server_version))
        .with_state(state);

    if production {
        return app;
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    app.layer(cors)
}
