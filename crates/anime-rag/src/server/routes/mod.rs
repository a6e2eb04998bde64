//! API routes for the RAG server

pub mod initialize;
pub mod query;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Pipeline management
        .route("/initialize", post(initialize::initialize))
        .route("/config", get(initialize::config))
        // Query
        .route("/query", post(query::query))
        .route("/query/stream", post(query::query_stream))
        // Routes used by the recommender frontend
        .route("/anime", post(query::query))
        .route("/anime/stream", post(query::query_stream))
}
