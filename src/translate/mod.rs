//! API translation between the `OpenAI` Chat Completions format and the Dify
//! chat API.
//!
//! The core of the proxy: converts requests, responses, and streaming events
//! between the two wire formats. All translation functions are pure (no I/O);
//! the streaming translator additionally owns the partial-line buffering
//! needed to reassemble upstream events from fragmented reads.

pub mod dify_types;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;
