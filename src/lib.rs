//! DocMill Server
//!
//! A thin orchestration layer around external document conversion
//! engines: uploads come in over HTTP, the Marker OCR CLI (or a
//! vision-language OCR API) does the actual work, and results are exposed
//! for download through session-scoped directories.
//!
//! # Modules
//!
//! - `engine`: adapters for the external conversion backends
//! - `convert`: per-file pipeline (invoke, locate outputs, post-process)
//! - `session`: session records, store, and on-disk layout
//! - `jobs`: one background task per upload batch
//! - `retention`: keep-N-most-recent eviction over session directories
//! - `routes`: the HTTP surface

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod retention;
pub mod routes;
pub mod session;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::info::router())
        .merge(routes::convert::router())
        .nest("/api", routes::sessions::router())
        .layer(DefaultBodyLimit::max(state.config().max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
