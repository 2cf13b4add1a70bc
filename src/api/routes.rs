//! API Routes
//!
//! Configures the Axum router with all demo service endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_item_handler, get_item_handler, health_handler, refresh_item_handler,
    set_item_handler, stats_handler, sweep_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/items/:id",
            get(get_item_handler)
                .put(set_item_handler)
                .delete(delete_item_handler),
        )
        .route("/items/:id/refresh", post(refresh_item_handler))
        .route("/sweep", post(sweep_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
