use clap::Parser;
use dify_proxy::{build_router, AppState, ProxyConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "dify-proxy",
    about = "OpenAI-compatible API proxy for Dify — expose a Dify app through the Chat Completions wire format",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream base URL (overrides config and DIFY_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Log file path
    #[arg(long, default_value = "dify-proxy.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dify_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    } else if let Ok(port) = std::env::var("PORT") {
        if let Ok(port) = port.parse() {
            config.port = port;
        }
    }
    if let Some(base_url) = cli.base_url {
        config.upstream.base_url = Some(base_url);
    }

    let logger = SharedLogger::new(&cli.log_file)?;

    // Validate config eagerly: a missing credential stops the process here,
    // not on the first request.
    let base_url = config.effective_base_url();
    let _api_key = config.resolve_api_key()?;

    info!("dify-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", base_url);
    info!("  Port:      {}", config.port);
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting dify-proxy base_url={} port={}",
            base_url, config.port
        ),
    );

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let state = Arc::new(AppState {
        config: config.clone(),
        client,
        logger: logger.clone(),
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  Point any OpenAI client at http://localhost:{}/v1", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
