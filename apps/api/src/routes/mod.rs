pub mod fields;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::rubric::handlers as rubric;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Rubric templates
        .route("/api/prompt", post(rubric::handle_build_templates))
        .route("/api/criteria/default", get(rubric::handle_default_criteria))
        // Chat
        .route("/api/chat", post(chat::handle_chat))
        .route("/api/chat/stream", post(chat::handle_chat_stream))
        .with_state(state)
}
