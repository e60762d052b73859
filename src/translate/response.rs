//! Translate Dify blocking responses into `OpenAI` Chat Completion documents.

use super::dify_types::ChatResponse;
use super::openai_types::{
    ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage,
};

/// Translate a Dify blocking-mode response into an `OpenAI` Chat Completion.
/// `model` is what the client originally requested; Dify has no model field
/// of its own, so it is echoed back.
pub fn dify_to_openai(resp: &ChatResponse, model: &str) -> ChatCompletionResponse {
    let id = match resp.message_id {
        Some(ref message_id) => format!("chatcmpl-{message_id}"),
        None => format!(
            "chatcmpl-{}",
            uuid::Uuid::new_v4().to_string().replace('-', "")
        ),
    };

    let created = resp
        .created_at
        .unwrap_or_else(|| chrono::Utc::now().timestamp());

    let usage = resp
        .metadata
        .as_ref()
        .and_then(|m| m.usage.as_ref())
        .map(|u| ChatUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

    ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: "assistant".to_string(),
                content: resp.answer.clone(),
            },
            finish_reason: Some("stop".to_string()),
        }],
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::dify_types::{DifyUsage, ResponseMetadata};

    fn blocking_response(answer: &str) -> ChatResponse {
        ChatResponse {
            message_id: Some("abc123".to_string()),
            conversation_id: Some("conv1".to_string()),
            answer: answer.to_string(),
            created_at: Some(1_712_000_000),
            metadata: Some(ResponseMetadata {
                usage: Some(DifyUsage {
                    prompt_tokens: 12,
                    completion_tokens: 7,
                    total_tokens: 19,
                }),
            }),
        }
    }

    #[test]
    fn test_blocking_response_mapping() {
        let result = dify_to_openai(&blocking_response("Hello there"), "gpt-4o");

        assert_eq!(result.id, "chatcmpl-abc123");
        assert_eq!(result.object, "chat.completion");
        assert_eq!(result.created, 1_712_000_000);
        assert_eq!(result.model, "gpt-4o");
        assert_eq!(result.choices.len(), 1);
        assert_eq!(result.choices[0].index, 0);
        assert_eq!(result.choices[0].message.role, "assistant");
        assert_eq!(result.choices[0].message.content, "Hello there");
        assert_eq!(result.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_usage_mapping() {
        let result = dify_to_openai(&blocking_response("hi"), "m");
        let usage = result.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 7);
        assert_eq!(usage.total_tokens, 19);
    }

    #[test]
    fn test_fallbacks_when_upstream_omits_fields() {
        let resp = ChatResponse {
            message_id: None,
            conversation_id: None,
            answer: "bare".to_string(),
            created_at: None,
            metadata: None,
        };

        let result = dify_to_openai(&resp, "m");
        assert!(result.id.starts_with("chatcmpl-"));
        assert!(result.id.len() > "chatcmpl-".len());
        assert!(result.created > 0);
        assert!(result.usage.is_none());
    }
}
