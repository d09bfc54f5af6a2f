pub mod chat;
pub mod state;

use axum::{Json, Router, routing::get, routing::post};

pub use state::AppState;

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "promptrelay is working!".to_string(),
    })
}

/// Build the relay router: one chat route plus a health check.
pub fn router(state: AppState, chat_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(chat_path, post(chat::post_chat))
        .with_state(state)
}
