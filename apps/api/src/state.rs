use crate::llm_client::Agent;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub agent: Agent,
    /// Server-side JSON Schema for `/api/chat`. Clients cannot override it.
    pub chat_schema: Option<String>,
}
