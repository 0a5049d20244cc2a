//! API route definitions.

use axum::routing::{get, post};
use axum::Router;

use crate::cors::cors_layer;
use crate::handlers;
use crate::state::AppState;

/// Build the complete API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/process-text", post(handlers::process_text))
        .route("/api/process-text/stream", get(handlers::process_text_stream))
        .route("/api/hyperedge/add", post(handlers::add_hyperedge))
        .route("/api/hyperstructure/clear", post(handlers::clear_hyperstructure))
        .route("/api/hyperstructure/data", get(handlers::get_hyperstructure_data))
        .route("/api/query/ask", post(handlers::ask_query))
        .layer(cors_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds_with_fresh_state() {
        let _router = create_router(AppState::new());
    }
}
