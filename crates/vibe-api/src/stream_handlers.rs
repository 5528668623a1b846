use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::{ApiError, ApiResult, AppState};

const DEFAULT_MAX_TOKENS: usize = 4000;
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Deserialize)]
pub struct StreamRequest {
    pub prompt: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Whole-stream timeout in seconds; the only bounded-abort mechanism.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Stream an LLM response as server-sent events: `{chunk}` fragments, then
/// a terminal `{done}` or `{error}` event. The chunks are also accumulated
/// and written as one composite log record after the stream ends.
pub async fn stream_response(
    State(state): State<AppState>,
    Json(request): Json<StreamRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let prompt = request
        .prompt
        .ok_or_else(|| ApiError::BadRequest("Prompt is required".to_string()))?;

    let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    let timeout_secs = request.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
    let system_prompt = request.system_prompt;

    info!(
        "Processing streaming request: {:.100}...",
        prompt.replace('\n', " ")
    );
    state.reqlog.log_api_request(
        "/api/stream-response",
        json!({
            "prompt": prompt.clone(),
            "max_tokens": max_tokens,
            "temperature": temperature,
        }),
        None,
        None,
    );

    if !state.llm.test_connection().await {
        state
            .reqlog
            .log_error("llm_connection", "LLM connectivity probe failed", json!({}));
        return Err(ApiError::ServiceUnavailable(
            "AI service temporarily unavailable".to_string(),
        ));
    }

    let mut llm_stream = state
        .llm
        .invoke_streaming(&prompt, system_prompt.as_deref(), max_tokens, temperature)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to stream response: {}", e)))?;

    let reqlog = state.reqlog.clone();
    let sse_stream = async_stream::stream! {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
        let mut chunks: Vec<String> = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, llm_stream.next()).await {
                // Timeout is a distinct failure kind, not a generic error.
                Err(_) => {
                    error!("Streaming response timed out after {}s", timeout_secs);
                    reqlog.log_error(
                        "streaming_timeout",
                        "stream timed out",
                        json!({"timeout_secs": timeout_secs, "chunks_received": chunks.len()}),
                    );
                    yield Ok::<Event, Infallible>(Event::default().data(
                        json!({"error": "stream timed out", "timeout": true}).to_string(),
                    ));
                    break;
                }
                Ok(None) => {
                    reqlog.log_streaming_response(
                        &prompt,
                        &chunks,
                        json!({
                            "max_tokens": max_tokens,
                            "temperature": temperature,
                            "system_prompt": system_prompt.is_some(),
                        }),
                    );
                    yield Ok(Event::default().data(json!({"done": true}).to_string()));
                    break;
                }
                Ok(Some(Ok(chunk))) => {
                    chunks.push(chunk.clone());
                    yield Ok(Event::default().data(json!({"chunk": chunk}).to_string()));
                }
                Ok(Some(Err(e))) => {
                    error!("Error in streaming: {}", e);
                    reqlog.log_error(
                        "streaming",
                        &e.to_string(),
                        json!({"prompt": prompt.chars().take(100).collect::<String>()}),
                    );
                    yield Ok(Event::default().data(json!({"error": e.to_string()}).to_string()));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
