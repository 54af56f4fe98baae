pub mod config;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use handlers::AppState;
use plinko::engine::QueryEngine;

pub fn build_router(engine: Arc<QueryEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/query/plaintext", post(handlers::plaintext_query))
        .route("/query/fullset", post(handlers::full_set_query))
        .route("/query/setparity", post(handlers::set_parity_query))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .with_state(state)
}
