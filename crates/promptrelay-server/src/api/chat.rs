//! The chat relay route

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use serde::Deserialize;

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
}

/// `POST /api/chat`: forward the prompt upstream and stream raw generated
/// text back as a chunked plain-text body.
///
/// The upstream call is opened before the response starts, so failures at
/// that point still produce a structured JSON error. Once streaming has
/// begun the only failure signal is an early connection close.
pub async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let prompt = request.prompt.trim().to_string();
    if prompt.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Prompt is required" })),
        )
            .into_response();
    }

    tracing::debug!(prompt_len = prompt.len(), "relaying chat prompt upstream");

    match state.upstream.fetch_stream(&prompt).await {
        Ok(stream) => {
            let body = Body::from_stream(
                stream.inspect_err(|e| tracing::warn!(error = %e, "upstream stream failed")),
            );
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                body,
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to open upstream stream");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}
