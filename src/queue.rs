//! Lease-based crawl work queue.
//!
//! A url is handed to at most one worker per staleness window. Leasing never
//! waits on another caller: each candidate is claimed with a conditional
//! update, and a candidate that was claimed first by someone else is
//! skipped. There is no release or heartbeat; an abandoned lease simply
//! goes stale. Once any crawl record exists for a url it is never leased
//! again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ArchiveError;
use crate::model::{CrawlRecord, NewCrawl, non_empty};
use crate::store::Store;

/// Candidates fetched per requested url, to absorb rows lost to other callers.
const LEASE_OVERSAMPLE: usize = 2;

pub const DEFAULT_STALENESS: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct CrawlQueue {
    store: Arc<dyn Store>,
}

impl CrawlQueue {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn lease(&self, max_count: usize, staleness: Duration) -> Result<Vec<String>, ArchiveError> {
        self.lease_at(Utc::now(), max_count, staleness).await
    }

    /// Leases up to `max_count` urls as of `now`. An empty result is not an error.
    pub async fn lease_at(
        &self,
        now: DateTime<Utc>,
        max_count: usize,
        staleness: Duration,
    ) -> Result<Vec<String>, ArchiveError> {
        if max_count == 0 {
            return Err(ArchiveError::validation("lease count must be positive"));
        }
        if staleness.is_zero() {
            return Err(ArchiveError::validation("lease staleness must be positive"));
        }
        let cutoff = chrono::Duration::from_std(staleness)
            .ok()
            .and_then(|staleness| now.checked_sub_signed(staleness))
            .ok_or_else(|| ArchiveError::validation("lease staleness out of range"))?;

        let candidates = self
            .store
            .lease_candidates(cutoff, max_count.saturating_mul(LEASE_OVERSAMPLE))
            .await
            .map_err(|e| ArchiveError::storage("error getting pending crawls", e))?;

        let mut leased = Vec::with_capacity(max_count);
        for url in candidates {
            if leased.len() == max_count {
                break;
            }

            let claimed = self
                .store
                .try_lease(&url, now, cutoff)
                .await
                .map_err(|e| ArchiveError::storage("error getting pending crawls", e))?;

            if claimed {
                leased.push(url);
            } else {
                tracing::debug!(%url, "lease taken by another worker, skipping");
            }
        }

        if !leased.is_empty() {
            tracing::info!(count = leased.len(), "leased urls for crawling");
        }
        Ok(leased)
    }

    /// Records a finished crawl and fills the bookmark title if it has none.
    ///
    /// The record append decides success. A failed title patch after it is
    /// logged and reported as `Ok(false)`.
    pub async fn complete(
        &self,
        url: &str,
        title: Option<String>,
        body: Option<String>,
    ) -> Result<bool, ArchiveError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ArchiveError::validation("no url provided"));
        }

        let crawl = NewCrawl {
            url: url.to_string(),
            title: non_empty(title),
            body: non_empty(body),
            recorded_at: Utc::now(),
        };

        self.store
            .append_crawl(&crawl)
            .await
            .map_err(|e| ArchiveError::storage("failed to add crawl", e))?;

        let Some(title) = crawl.title.as_deref() else {
            return Ok(false);
        };

        match self.store.fill_missing_title(url, title).await {
            Ok(filled) => Ok(filled),
            Err(e) => {
                tracing::warn!(%url, error = %e, "crawl stored but title update failed");
                Ok(false)
            }
        }
    }

    pub async fn history(&self, url: &str) -> Result<Vec<CrawlRecord>, ArchiveError> {
        self.store
            .crawl_records(url)
            .await
            .map_err(|e| ArchiveError::storage("failed to get crawls", e))
    }
}
