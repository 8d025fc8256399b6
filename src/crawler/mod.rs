//! Polling crawl worker.
//!
//! Each tick leases a batch of urls from the api, renders them all
//! concurrently and reports every successful render. A render that fails is
//! only logged; its lease goes stale and the url is handed out again later.
//!
//! ```rust,ignore
//! let client = ApiClient::new(cfg)?;
//! let renderer = Arc::new(HttpRenderer::new(Duration::from_secs(30))?);
//! Crawler::new(client, renderer, Duration::from_secs(1)).run(token).await;
//! ```

mod client;
mod render;

pub use client::{ApiClient, ClientConfig};
pub use render::{HttpRenderer, Rendered, Renderer, extract};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::AddCrawlRequest;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub leased: usize,
    pub saved: usize,
    pub failed: usize,
}

pub struct Crawler {
    client: ApiClient,
    renderer: Arc<dyn Renderer>,
    poll_interval: Duration,
}

impl Crawler {
    pub fn new(client: ApiClient, renderer: Arc<dyn Renderer>, poll_interval: Duration) -> Self {
        Self {
            client,
            renderer,
            poll_interval,
        }
    }

    pub async fn poll_once(&self) -> Result<PollStats> {
        let urls = self.client.pending_crawls().await?;
        let mut stats = PollStats {
            leased: urls.len(),
            ..Default::default()
        };

        let results = join_all(urls.iter().map(|url| self.crawl(url))).await;
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(()) => stats.saved += 1,
                Err(e) => {
                    tracing::error!(%url, error = %format!("{e:#}"), "crawl failed");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn crawl(&self, url: &str) -> Result<()> {
        let rendered = self
            .renderer
            .render(url)
            .await
            .with_context(|| format!("rendering {url}"))?;

        tracing::info!(%url, "saving crawl");
        self.client
            .save_crawl(&AddCrawlRequest {
                url: url.to_string(),
                title: rendered.title,
                body: rendered.body,
            })
            .await?;
        Ok(())
    }

    /// Polls until `token` is cancelled. A batch in flight is finished first.
    pub async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(stats) if stats.leased > 0 => {
                            tracing::info!(leased = stats.leased, saved = stats.saved, failed = stats.failed, "batch done");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %format!("{e:#}"), "failed to get pending crawls"),
                    }
                }
                _ = token.cancelled() => {
                    tracing::info!("crawler shutting down");
                    break;
                }
            }
        }
    }
}
