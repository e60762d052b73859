//! Demonstrate the translation layer without a server.
//!
//! Usage:
//!   `cargo run --example translate_only`

use dify_proxy::translate::openai_types::ChatCompletionRequest;
use dify_proxy::translate::request::openai_to_dify;
use dify_proxy::translate::streaming::StreamTranslator;

fn main() {
    // Build an OpenAI-shaped request (what a client sends us)
    let openai_req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
        "model": "gpt-4o",
        "messages": [
            {"role": "system", "content": "You are a geography expert. Be concise."},
            {"role": "user", "content": "What is the capital of France?"},
            {"role": "assistant", "content": "The capital of France is Paris."},
            {"role": "user", "content": "And Germany?"},
        ],
        "stream": true,
        "user": "demo",
    }))
    .unwrap();

    // Translate to the Dify chat request
    let dify_req = openai_to_dify(&openai_req);

    println!("=== Translated Request (Dify format) ===");
    println!("{}", serde_json::to_string_pretty(&dify_req).unwrap());
    println!();

    // Replay a canned upstream stream through the translator, delivered in
    // deliberately awkward chunks (one splits a line in half)
    let upstream_chunks: &[&[u8]] = &[
        b"data: {\"event\":\"message\",\"data\":{\"answ",
        b"er\":\"Berlin\"}}\n\ndata: {\"data\":{\"answer\":\".\"}}\n\n",
        b"data: [DONE]\n\n",
    ];

    println!("=== Translated Stream (OpenAI format) ===");
    let mut translator = StreamTranslator::new();
    for chunk in upstream_chunks {
        for frame in translator.process_bytes(chunk) {
            print!("{}", frame.to_sse_string());
        }
    }
    for frame in translator.finish() {
        print!("{}", frame.to_sse_string());
    }
}
