//! Start a dify-proxy server programmatically.
//!
//! Usage:
//!   export DIFY_API_KEY=app-your_key
//!   cargo run --example basic_proxy

use dify_proxy::{build_router, AppState, ProxyConfig, SharedLogger};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ProxyConfig::find_and_load(None)?;
    let base_url = config.effective_base_url();
    let _api_key = config.resolve_api_key()?;

    println!("Upstream: {}", base_url);

    let logger = SharedLogger::new("proxy-example.log")?;
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        client,
        logger,
    });

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("Listening on http://{}", addr);
    println!();
    println!("  curl http://localhost:{}/v1/chat/completions \\", port);
    println!("    -d '{{\"model\":\"dify\",\"messages\":[{{\"role\":\"user\",\"content\":\"hi\"}}],\"stream\":true}}'");

    axum::serve(listener, app).await?;
    Ok(())
}
