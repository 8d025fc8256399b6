use std::time::Duration;

use anyhow::{Context, Result};
use archiver::crawler::{ApiClient, ClientConfig};
use archiver::import::parse_export;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pinboard_import")]
#[command(about = "Imports a Pinboard JSON export into the archiver")]
struct Cli {
    export_path: String,
    #[arg(long, env = "API_URL", default_value = "http://localhost:8080")]
    api_url: String,
    #[arg(long, env = "ARCHIVER_API_KEY", hide_env_values = true)]
    api_key: String,
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let raw = std::fs::read_to_string(&cli.export_path)
        .with_context(|| format!("reading {}", cli.export_path))?;
    let bookmarks = parse_export(&raw)?;
    tracing::info!(count = bookmarks.len(), "parsed pinboard export");

    let client = ApiClient::new(ClientConfig {
        api_url: cli.api_url,
        api_key: cli.api_key,
        timeout: Duration::from_secs(60),
    })?;

    let (mut inserted, mut skipped) = (0, 0);
    for (i, batch) in bookmarks.chunks(cli.batch_size.max(1)).enumerate() {
        let resp = client
            .add_bookmarks(batch.to_vec())
            .await
            .with_context(|| format!("importing batch {i}"))?;
        inserted += resp.inserted;
        skipped += resp.skipped;
    }

    tracing::info!(inserted, skipped, "import complete");
    Ok(())
}
