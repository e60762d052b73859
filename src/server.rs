use crate::config::ProxyConfig;
use crate::logging::SharedLogger;
use crate::proxy::{self, ProxyResult, StreamOutcome};
use crate::translate::openai_types::{ChatCompletionRequest, ChatErrorResponse};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/models", get(handle_models))
        .route("/health", get(handle_health))
        .route("/logs", get(handle_logs))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    let req: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            state
                .logger
                .error("server", format!("Failed to parse request: {}", e));
            let err = ChatErrorResponse::invalid_request(format!("Invalid request body: {}", e));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    state.logger.info(
        "server",
        format!(
            "Request: model={} streaming={} messages={}",
            req.model,
            req.is_streaming(),
            req.messages.len()
        ),
    );

    if req.is_streaming() {
        handle_streaming(state, &req).await
    } else {
        handle_non_streaming(state, &req).await
    }
}

async fn handle_non_streaming(state: Arc<AppState>, req: &ChatCompletionRequest) -> Response {
    match proxy::proxy_non_streaming(req, &state.config, &state.client, &state.logger).await {
        Ok(ProxyResult::Success(resp)) => Json(resp).into_response(),
        Ok(ProxyResult::Rejected { status, body }) => rejected_response(status, body),
        Err(e) => {
            state.logger.error("server", format!("Proxy error: {}", e));
            let err = ChatErrorResponse::api_error(format!("Proxy error: {}", e));
            (StatusCode::BAD_GATEWAY, Json(err)).into_response()
        }
    }
}

async fn handle_streaming(state: Arc<AppState>, req: &ChatCompletionRequest) -> Response {
    let outcome =
        match proxy::proxy_streaming(req, &state.config, &state.client, &state.logger).await {
            Ok(o) => o,
            Err(e) => {
                state
                    .logger
                    .error("server", format!("Streaming setup error: {}", e));
                let err = ChatErrorResponse::api_error(format!("Streaming error: {}", e));
                return (StatusCode::BAD_GATEWAY, Json(err)).into_response();
            }
        };

    match outcome {
        StreamOutcome::Stream(frames) => {
            let event_stream = frames.map(|frame| -> std::result::Result<Event, Infallible> {
                Ok(Event::default().data(frame.sse_data()))
            });

            Sse::new(event_stream)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        StreamOutcome::Rejected { status, body } => rejected_response(status, body),
    }
}

/// Forward an upstream rejection verbatim: same status, same body.
fn rejected_response(status: u16, body: String) -> Response {
    let status_code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    Response::builder()
        .status(status_code)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Minimal model listing so OpenAI clients that probe `/v1/models` work.
/// Dify has no model discovery surface; the proxied app is the one "model".
async fn handle_models() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "object": "list",
        "data": [{
            "id": "dify",
            "object": "model",
            "owned_by": "dify",
        }],
    }))
}

#[derive(Deserialize)]
struct LogsParams {
    limit: Option<usize>,
}

async fn handle_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsParams>,
) -> Json<serde_json::Value> {
    let entries = state.logger.recent(params.limit.unwrap_or(100));
    Json(serde_json::json!({ "entries": entries }))
}
