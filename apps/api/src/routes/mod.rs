pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::{handlers, suggestions};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat API
        .route("/api/chat", post(handlers::handle_chat))
        .route(
            "/api/chat/suggestions",
            get(suggestions::handle_suggestions),
        )
        .with_state(state)
}
