use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Response;

use crate::api::{
    AddBookmarkRequest, AddBookmarkResponse, AddCrawlRequest, AddCrawlResponse, ErrorResponse,
    PendingCrawlsResponse,
};
use crate::model::BookmarkInput;

/// Where the archiver api lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

pub struct ApiClient {
    http: reqwest::Client,
    cfg: ClientConfig,
}

impl ApiClient {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("building http client")?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api{}", self.cfg.api_url.trim_end_matches('/'), path)
    }

    pub async fn pending_crawls(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.endpoint("/crawl/pending"))
            .bearer_auth(&self.cfg.api_key)
            .send()
            .await
            .context("requesting pending crawls")?;

        let body: PendingCrawlsResponse = check(resp).await?.json().await?;
        Ok(body.urls)
    }

    pub async fn save_crawl(&self, crawl: &AddCrawlRequest) -> Result<AddCrawlResponse> {
        let resp = self
            .http
            .post(self.endpoint("/crawl"))
            .bearer_auth(&self.cfg.api_key)
            .json(crawl)
            .send()
            .await
            .with_context(|| format!("saving crawl for {}", crawl.url))?;

        Ok(check(resp).await?.json().await?)
    }

    pub async fn add_bookmarks(&self, bookmarks: Vec<BookmarkInput>) -> Result<AddBookmarkResponse> {
        let resp = self
            .http
            .post(self.endpoint("/bookmark"))
            .bearer_auth(&self.cfg.api_key)
            .json(&AddBookmarkRequest { bookmarks })
            .send()
            .await
            .context("adding bookmarks")?;

        Ok(check(resp).await?.json().await?)
    }
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    match resp.json::<ErrorResponse>().await {
        Ok(ErrorResponse { message, partial: true, committed, .. }) => anyhow::bail!(
            "api returned {status}: {message} ({} stored before the failure)",
            committed.unwrap_or(0)
        ),
        Ok(err) => anyhow::bail!("api returned {status}: {}", err.message),
        Err(_) => anyhow::bail!("api returned {status}"),
    }
}
