use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::logging::SharedLogger;
use crate::translate::dify_types::ChatResponse;
use crate::translate::openai_types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::translate::request::openai_to_dify;
use crate::translate::response::dify_to_openai;
use crate::translate::streaming::{OutboundFrame, StreamTranslator};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;
use std::time::Duration;

/// How long to wait for the next upstream chunk before closing the session.
/// Not part of the upstream contract, but a stuck upstream must not hold a
/// downstream connection open forever.
const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of proxying a non-streaming request.
pub enum ProxyResult {
    Success(ChatCompletionResponse),
    /// Upstream rejected the request before any output was produced. Status
    /// and body are handed back to the caller verbatim, never retried.
    Rejected { status: u16, body: String },
}

/// Outcome of initiating a streaming request.
pub enum StreamOutcome {
    Stream(SseStream),
    Rejected { status: u16, body: String },
}

/// The translated outbound stream for one session.
pub type SseStream = Pin<Box<dyn Stream<Item = OutboundFrame> + Send>>;

/// Forward a non-streaming request through Dify blocking mode.
pub async fn proxy_non_streaming(
    req: &ChatCompletionRequest,
    config: &ProxyConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<ProxyResult> {
    let api_key = config.resolve_api_key()?;
    let url = chat_url(config);

    let dify_req = openai_to_dify(req);

    logger.info("proxy", format!("POST {} user={}", url, dify_req.user));

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&dify_req)
        .send()
        .await
        .map_err(|e| ProxyError::upstream(format!("Request failed: {}", e)))?;

    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| {
        ProxyError::upstream(format!("Failed to read response body: {}", e))
    })?;

    logger.debug(
        "proxy",
        format!("Response status={} body_len={}", status, body.len()),
    );

    if status >= 400 {
        logger.warn(
            "proxy",
            format!("Upstream rejection: status={} body={}", status, truncate(&body, 300)),
        );
        return Ok(ProxyResult::Rejected { status, body });
    }

    let dify_resp: ChatResponse = serde_json::from_str(&body).map_err(|e| {
        ProxyError::translation(format!(
            "Failed to parse upstream response: {}. Body: {}",
            e,
            truncate(&body, 300)
        ))
    })?;

    let openai_resp = dify_to_openai(&dify_resp, &req.model);

    logger.info(
        "proxy",
        format!("Completed: answer_len={}", dify_resp.answer.len()),
    );

    Ok(ProxyResult::Success(openai_resp))
}

/// Forward a streaming request, returning the translated event stream.
pub async fn proxy_streaming(
    req: &ChatCompletionRequest,
    config: &ProxyConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<StreamOutcome> {
    let api_key = config.resolve_api_key()?;
    let url = chat_url(config);

    let dify_req = openai_to_dify(req);

    logger.info(
        "proxy",
        format!("POST {} user={} (streaming)", url, dify_req.user),
    );

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&dify_req)
        .send()
        .await
        .map_err(|e| ProxyError::upstream(format!("Streaming request failed: {}", e)))?;

    let status = response.status().as_u16();

    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        logger.warn(
            "proxy",
            format!("Upstream rejection: status={} body={}", status, truncate(&body, 300)),
        );
        return Ok(StreamOutcome::Rejected { status, body });
    }

    let byte_stream = response.bytes_stream();
    let event_stream = sse_translate_stream(byte_stream, logger.clone());

    Ok(StreamOutcome::Stream(Box::pin(event_stream)))
}

/// Drive one streaming session: feed upstream bytes through the
/// [`StreamTranslator`] and emit translated frames as they complete.
///
/// Reads and writes alternate strictly; there is no queue between them, so
/// the session backpressures on the downstream sink. The translator's
/// `finish()` runs after the loop no matter how the loop ends (EOF, read
/// error, idle timeout), so every session terminates with exactly one
/// `[DONE]`. Once the sentinel has latched, reading stops and the upstream
/// connection is released.
pub fn sse_translate_stream<E>(
    byte_stream: impl Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    logger: SharedLogger,
) -> impl Stream<Item = OutboundFrame> + Send + 'static
where
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut translator = StreamTranslator::new();

        tokio::pin!(byte_stream);

        loop {
            let chunk = match tokio::time::timeout(IDLE_READ_TIMEOUT, byte_stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => {
                    logger.error("stream", format!("Upstream read error: {}", e));
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    logger.warn(
                        "stream",
                        format!(
                            "No upstream bytes for {}s, closing session",
                            IDLE_READ_TIMEOUT.as_secs()
                        ),
                    );
                    break;
                }
            };

            for frame in translator.process_bytes(&chunk) {
                yield frame;
            }

            if translator.is_finished() {
                break;
            }
        }

        for frame in translator.finish() {
            yield frame;
        }

        logger.info("stream", "Stream completed");
    }
}

fn chat_url(config: &ProxyConfig) -> String {
    format!(
        "{}/chat-messages",
        config.effective_base_url().trim_end_matches('/')
    )
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..max]
    }
}
