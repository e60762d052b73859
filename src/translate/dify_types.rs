//! Type definitions for the Dify chat API (what we speak upstream).
//!
//! Covers the outbound chat-message request, the bounded blocking response,
//! and the per-line payloads of the streaming response.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what we send TO Dify)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub inputs: serde_json::Map<String, serde_json::Value>,
    pub user: String,
    pub response_mode: ResponseMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Streaming,
    Blocking,
}

// ---------------------------------------------------------------------------
// Response types (what Dify sends back in blocking mode)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub usage: Option<DifyUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DifyUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Streaming event payloads (one per `data:` line)
// ---------------------------------------------------------------------------

/// One parsed upstream stream event. The answer fragment usually sits under
/// `data.answer`; some deployments flatten it to a top-level `answer`. Events
/// carrying neither (pings, workflow progress) translate to an empty delta.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<UpstreamEventData>,
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamEventData {
    #[serde(default)]
    pub answer: Option<String>,
}

impl UpstreamEvent {
    /// The text fragment this event contributes, empty when absent.
    pub fn answer_fragment(&self) -> &str {
        self.data
            .as_ref()
            .and_then(|d| d.answer.as_deref())
            .or(self.answer.as_deref())
            .unwrap_or("")
    }
}
