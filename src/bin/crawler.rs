use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use archiver::crawler::{ApiClient, ClientConfig, Crawler, HttpRenderer};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Leases pending urls from the archiver and records their content")]
struct Cli {
    #[arg(long, env = "API_URL", default_value = "http://localhost:8080")]
    api_url: String,
    #[arg(long, env = "ARCHIVER_API_KEY", hide_env_values = true)]
    api_key: String,
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let timeout = Duration::from_secs(cli.timeout_secs);
    let client = ApiClient::new(ClientConfig {
        api_url: cli.api_url.clone(),
        api_key: cli.api_key,
        timeout,
    })?;
    let renderer = Arc::new(HttpRenderer::new(timeout)?);
    let crawler = Crawler::new(client, renderer, Duration::from_millis(cli.poll_interval_ms));

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl+c signal received, finishing current batch");
        }
        ctrl_c_token.cancel();
    });

    tracing::info!(api_url = %cli.api_url, "crawler starting");
    crawler.run(token).await;
    Ok(())
}
