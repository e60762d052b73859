//! Line-oriented translator for Dify SSE streams.
//!
//! The [`StreamTranslator`] consumes the upstream response body as raw byte
//! chunks with no alignment guarantees, reassembles complete `data:` lines,
//! and emits `OpenAI`-shaped stream frames one per upstream event. It owns
//! the two pieces of per-session state the translation needs: the partial
//! line carried between reads, and the latch guaranteeing exactly one
//! termination sequence per session.
//!
//! Usage:
//!   let mut translator = StreamTranslator::new();
//!   while let Some(bytes) = upstream.next().await {
//!       for frame in translator.process_bytes(&bytes) {
//!           // write frame as SSE
//!       }
//!   }
//!   for frame in translator.finish() {
//!       // write frame as SSE
//!   }

use super::dify_types::UpstreamEvent;
use super::openai_types::ChatCompletionChunk;

/// SSE event-data marker on upstream lines.
const DATA_PREFIX: &str = "data:";

/// Payload value signaling end-of-stream, distinct from event payloads.
const DONE_SENTINEL: &str = "[DONE]";

/// One unit of the translated outbound stream.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl OutboundFrame {
    /// The `data:` payload for this frame.
    pub fn sse_data(&self) -> String {
        match self {
            OutboundFrame::Chunk(chunk) => {
                serde_json::to_string(chunk).unwrap_or_else(|_| "{}".to_string())
            }
            OutboundFrame::Done => DONE_SENTINEL.to_string(),
        }
    }

    /// The fully framed SSE event: `data: <payload>` plus the blank-line
    /// separator.
    pub fn to_sse_string(&self) -> String {
        format!("data: {}\n\n", self.sse_data())
    }
}

/// Translates an upstream Dify event stream into `OpenAI` stream frames.
#[derive(Debug, Default)]
pub struct StreamTranslator {
    /// Bytes received but not yet terminated by a newline. Held as raw bytes
    /// so a multi-byte character split across reads is reassembled before
    /// any decoding happens; line terminators cannot occur inside a
    /// multi-byte UTF-8 sequence.
    buffer: Vec<u8>,
    finished: bool,
}

impl StreamTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the termination sequence has been emitted. Once set, the
    /// session is logically complete and callers may stop reading upstream.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one chunk of upstream bytes, returning the frames it completes.
    ///
    /// Every fully terminated line in the buffer is processed in arrival
    /// order; the trailing incomplete fragment is carried over to the next
    /// call. Bytes arriving after the `[DONE]` sentinel are drained and
    /// ignored.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();

        if self.finished {
            return frames;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line[..newline_pos]);
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            // Only `data:` lines are events; comment and keep-alive lines
            // are dropped without complaint.
            let payload = match line.strip_prefix(DATA_PREFIX) {
                Some(rest) => rest.trim(),
                None => continue,
            };

            if payload == DONE_SENTINEL {
                frames.append(&mut self.finish());
                break;
            }

            // Malformed payloads are skipped, not surfaced: upstream streams
            // interleave lines that are not events.
            let event: UpstreamEvent = match serde_json::from_str(payload) {
                Ok(evt) => evt,
                Err(_) => continue,
            };

            frames.push(OutboundFrame::Chunk(ChatCompletionChunk::content(
                event.answer_fragment(),
            )));
        }

        frames
    }

    /// Emit the termination sequence: a closing chunk with
    /// `finish_reason: "stop"` followed by the `[DONE]` frame.
    ///
    /// Called unconditionally when the upstream body ends, whether or not a
    /// sentinel was seen; the latch makes the second call a no-op, so every
    /// session ends with exactly one termination sequence.
    pub fn finish(&mut self) -> Vec<OutboundFrame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        vec![
            OutboundFrame::Chunk(ChatCompletionChunk::stop()),
            OutboundFrame::Done,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run a full session over the given byte chunks and collect every frame.
    fn run_session(chunks: &[&[u8]]) -> Vec<OutboundFrame> {
        let mut translator = StreamTranslator::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.append(&mut translator.process_bytes(chunk));
        }
        frames.append(&mut translator.finish());
        frames
    }

    fn content_deltas(frames: &[OutboundFrame]) -> Vec<Option<String>> {
        frames
            .iter()
            .filter_map(|f| match f {
                OutboundFrame::Chunk(c) if c.choices[0].finish_reason.is_none() => {
                    Some(c.choices[0].delta.content.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn done_count(frames: &[OutboundFrame]) -> usize {
        frames
            .iter()
            .filter(|f| matches!(f, OutboundFrame::Done))
            .count()
    }

    fn stop_count(frames: &[OutboundFrame]) -> usize {
        frames
            .iter()
            .filter(|f| match f {
                OutboundFrame::Chunk(c) => {
                    c.choices[0].finish_reason.as_deref() == Some("stop")
                }
                OutboundFrame::Done => false,
            })
            .count()
    }

    const BASIC_STREAM: &[u8] = b"data: {\"data\":{\"answer\":\"Hel\"}}\n\n\
                                  data: {\"data\":{\"answer\":\"lo\"}}\n\n\
                                  data: [DONE]\n\n";

    #[test]
    fn test_basic_scenario() {
        let frames = run_session(&[BASIC_STREAM]);

        assert_eq!(
            content_deltas(&frames),
            vec![Some("Hel".to_string()), Some("lo".to_string())]
        );
        assert_eq!(done_count(&frames), 1);
        assert_eq!(stop_count(&frames), 1);
    }

    #[test]
    fn test_arbitrary_chunk_boundaries_match_single_chunk() {
        // Re-split the same content at every byte position and compare
        // against the single-chunk result.
        let single = content_deltas(&run_session(&[BASIC_STREAM]));

        for split in 1..BASIC_STREAM.len() {
            let (a, b) = BASIC_STREAM.split_at(split);
            let frames = run_session(&[a, b]);
            assert_eq!(
                content_deltas(&frames),
                single,
                "divergence when splitting at byte {split}"
            );
            assert_eq!(done_count(&frames), 1);
        }
    }

    #[test]
    fn test_boundary_inside_marker() {
        // Chunk boundary inside `data:` and inside the JSON payload.
        let frames = run_session(&[
            b"da",
            b"ta: {\"data\":{\"answ",
            b"er\":\"X\"}}\n\n",
        ]);
        assert_eq!(content_deltas(&frames), vec![Some("X".to_string())]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        // U+00E9 is 0xC3 0xA9 in UTF-8; split between the two bytes.
        let full = "data: {\"data\":{\"answer\":\"caf\u{e9}\"}}\n\n".as_bytes();
        let split_at = full
            .windows(2)
            .position(|w| w == [0xC3, 0xA9])
            .expect("two-byte sequence present")
            + 1;

        let (a, b) = full.split_at(split_at);
        let frames = run_session(&[a, b]);
        assert_eq!(content_deltas(&frames), vec![Some("caf\u{e9}".to_string())]);
    }

    #[test]
    fn test_crlf_terminators() {
        let frames = run_session(&[
            b"data: {\"data\":{\"answer\":\"a\"}}\r\n\r\ndata: {\"data\":{\"answer\":\"b\"}}\r\n\r\n",
        ]);
        assert_eq!(
            content_deltas(&frames),
            vec![Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[test]
    fn test_order_preservation() {
        let mut body = Vec::new();
        for i in 0..20 {
            body.extend_from_slice(
                format!("data: {{\"data\":{{\"answer\":\"t{i}\"}}}}\n\n").as_bytes(),
            );
        }

        let frames = run_session(&[&body]);
        let deltas = content_deltas(&frames);
        assert_eq!(deltas.len(), 20);
        for (i, delta) in deltas.iter().enumerate() {
            assert_eq!(delta.as_deref(), Some(format!("t{i}").as_str()));
        }
        assert_eq!(done_count(&frames), 1);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let with_noise = run_session(&[
            b"data: not-json\n\
              event: message\n\
              : keep-alive comment\n\
              data: {\"data\":{\"answer\":\"ok\"}}\n\
              data: {broken\n\
              data: {\"data\":{\"answer\":\"fine\"}}\n\n",
        ]);
        let clean = run_session(&[
            b"data: {\"data\":{\"answer\":\"ok\"}}\n\
              data: {\"data\":{\"answer\":\"fine\"}}\n\n",
        ]);

        assert_eq!(content_deltas(&with_noise), content_deltas(&clean));
        assert_eq!(done_count(&with_noise), 1);
    }

    #[test]
    fn test_empty_answer_emits_empty_delta_chunk() {
        let frames = run_session(&[
            b"data: {\"data\":{\"answer\":\"\"}}\ndata: {\"event\":\"ping\"}\n\n",
        ]);
        // Both events produce a chunk; neither is dropped.
        assert_eq!(content_deltas(&frames), vec![None, None]);
    }

    #[test]
    fn test_termination_without_sentinel() {
        let frames = run_session(&[b"data: {\"data\":{\"answer\":\"cut\"}}\n\n"]);
        assert_eq!(content_deltas(&frames), vec![Some("cut".to_string())]);
        assert_eq!(done_count(&frames), 1);
        assert_eq!(stop_count(&frames), 1);
    }

    #[test]
    fn test_sentinel_then_close_emits_one_termination() {
        let mut translator = StreamTranslator::new();
        let frames = translator.process_bytes(BASIC_STREAM);
        assert_eq!(done_count(&frames), 1);
        assert!(translator.is_finished());

        // Close path after the sentinel is a no-op write.
        assert!(translator.finish().is_empty());
        assert!(translator.finish().is_empty());
    }

    #[test]
    fn test_bytes_after_sentinel_are_ignored() {
        let mut translator = StreamTranslator::new();
        let _ = translator.process_bytes(BASIC_STREAM);

        let late = translator.process_bytes(b"data: {\"data\":{\"answer\":\"late\"}}\n\n");
        assert!(late.is_empty());
        assert!(translator.finish().is_empty());
    }

    #[test]
    fn test_lines_buffered_past_sentinel_are_ignored() {
        // Sentinel and a trailing event arrive in one read.
        let frames = run_session(&[
            b"data: [DONE]\n\ndata: {\"data\":{\"answer\":\"ghost\"}}\n\n",
        ]);
        assert!(content_deltas(&frames).is_empty());
        assert_eq!(done_count(&frames), 1);
    }

    #[test]
    fn test_unterminated_trailing_line_is_dropped_at_close() {
        // A final fragment with no newline never forms an event.
        let frames = run_session(&[b"data: {\"data\":{\"answer\":\"whole\"}}\ndata: {\"data\":{\"ans"]);
        assert_eq!(content_deltas(&frames), vec![Some("whole".to_string())]);
        assert_eq!(done_count(&frames), 1);
    }

    #[test]
    fn test_marker_without_space() {
        let frames = run_session(&[b"data:{\"data\":{\"answer\":\"tight\"}}\n\n"]);
        assert_eq!(content_deltas(&frames), vec![Some("tight".to_string())]);
    }

    #[test]
    fn test_sse_framing() {
        let chunk = OutboundFrame::Chunk(ChatCompletionChunk::content("hi"));
        let framed = chunk.to_sse_string();
        assert!(framed.starts_with("data: {"));
        assert!(framed.ends_with("\n\n"));

        assert_eq!(OutboundFrame::Done.to_sse_string(), "data: [DONE]\n\n");
    }
}
