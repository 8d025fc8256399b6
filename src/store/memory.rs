//! In-memory [`Store`] for tests and embedded use.
//!
//! All state sits behind one `tokio::sync::Mutex`, which makes every trait
//! call atomic with respect to the others.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::Store;
use crate::model::{Bookmark, CrawlRecord, NewCrawl, PublicBookmark};

#[derive(Default)]
struct Inner {
    bookmarks: HashMap<String, Bookmark>,
    // insertion order, the equivalent of a table scan
    order: Vec<String>,
    crawls: Vec<CrawlRecord>,
    api_keys: HashSet<String>,
}

impl Inner {
    fn crawled(&self, url: &str) -> bool {
        self.crawls.iter().any(|c| c.url == url)
    }

    fn eligible(&self, b: &Bookmark, cutoff: DateTime<Utc>) -> bool {
        b.lease_at.is_none_or(|at| at < cutoff) && !self.crawled(&b.url)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.bookmarks.contains_key(&bookmark.url) {
            return Ok(false);
        }
        inner.order.push(bookmark.url.clone());
        inner.bookmarks.insert(bookmark.url.clone(), bookmark.clone());
        Ok(true)
    }

    async fn get_bookmark(&self, url: &str) -> Result<Option<Bookmark>> {
        Ok(self.inner.lock().await.bookmarks.get(url).cloned())
    }

    async fn lease_candidates(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|url| inner.bookmarks.get(url))
            .filter(|b| inner.eligible(b, cutoff))
            .take(limit)
            .map(|b| b.url.clone())
            .collect())
    }

    async fn try_lease(&self, url: &str, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let eligible = match inner.bookmarks.get(url) {
            Some(b) => inner.eligible(b, cutoff),
            None => false,
        };
        if !eligible {
            return Ok(false);
        }
        if let Some(b) = inner.bookmarks.get_mut(url) {
            b.lease_at = Some(now);
        }
        Ok(true)
    }

    async fn append_crawl(&self, crawl: &NewCrawl) -> Result<()> {
        self.inner.lock().await.crawls.push(CrawlRecord {
            url: crawl.url.clone(),
            title: crawl.title.clone(),
            body: crawl.body.clone(),
            recorded_at: crawl.recorded_at,
        });
        Ok(())
    }

    async fn fill_missing_title(&self, url: &str, title: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.bookmarks.get_mut(url) {
            Some(b) if b.title.is_none() => {
                b.title = Some(title.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn crawl_records(&self, url: &str) -> Result<Vec<CrawlRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.crawls.iter().filter(|c| c.url == url).cloned().collect())
    }

    async fn tagged_bookmarks(&self, tag: &str) -> Result<Vec<PublicBookmark>> {
        let inner = self.inner.lock().await;
        let mut out: Vec<PublicBookmark> = inner
            .bookmarks
            .values()
            .filter(|b| b.tags.as_ref().is_some_and(|tags| tags.iter().any(|t| t == tag)))
            .map(|b| PublicBookmark {
                url: b.url.clone(),
                title: b.title.clone(),
                time: b.created_at,
            })
            .collect();
        out.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(out)
    }

    async fn api_key_exists(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().await.api_keys.contains(key))
    }

    async fn add_api_key(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().await.api_keys.insert(key.to_string()))
    }
}
