//! Translate `OpenAI` Chat Completions requests into Dify chat requests.
//!
//! Dify takes a single query string per turn, so the inbound conversation is
//! collapsed by joining every message's content with a newline. Message roles
//! are discarded in the process: a known lossy simplification of the upstream
//! API surface, kept as observed rather than papered over with role prefixes.

use super::dify_types::{ChatRequest, ResponseMode};
use super::openai_types::ChatCompletionRequest;

/// User identifier sent upstream when the caller does not supply one.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Translate an `OpenAI` Chat Completions request into a Dify chat request.
/// Pure function: no defaults are read from the environment here.
pub fn openai_to_dify(req: &ChatCompletionRequest) -> ChatRequest {
    let query = req
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let inputs = req.inputs.clone().unwrap_or_default();

    let user = req
        .user
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| ANONYMOUS_USER.to_string());

    let response_mode = if req.is_streaming() {
        ResponseMode::Streaming
    } else {
        ResponseMode::Blocking
    };

    ChatRequest {
        query,
        inputs,
        user,
        response_mode,
    }
}
