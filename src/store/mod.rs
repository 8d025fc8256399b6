//! Storage abstraction shared by the bookmark store and the crawl queue.
//!
//! The [`Store`] trait is the only place state lives. Every concurrency
//! guarantee of the queue is expressed as a single atomic operation on it,
//! so any backend that honours these contracts can be plugged in:
//!
//! - [`libsql`](crate::db::Database): local SQLite file or a Turso replica.
//! - [`MemoryStore`]: in-process maps, used by tests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Bookmark, CrawlRecord, NewCrawl, PublicBookmark};

pub use memory::MemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts the bookmark unless a row with the same url exists.
    ///
    /// Returns `false` when the row already existed; it is left unchanged.
    async fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<bool>;

    async fn get_bookmark(&self, url: &str) -> Result<Option<Bookmark>>;

    /// Up to `limit` urls with no crawl record whose lease is absent or
    /// older than `cutoff`. Nothing is locked or stamped.
    async fn lease_candidates(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<String>>;

    /// Atomically stamps `lease_at = now` on `url` if it is still eligible
    /// against `cutoff`. `false` means another caller got there first.
    async fn try_lease(&self, url: &str, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<bool>;

    async fn append_crawl(&self, crawl: &NewCrawl) -> Result<()>;

    /// Sets the title only where the bookmark has none.
    async fn fill_missing_title(&self, url: &str, title: &str) -> Result<bool>;

    /// Crawl history for a url in append order.
    async fn crawl_records(&self, url: &str) -> Result<Vec<CrawlRecord>>;

    /// Bookmarks carrying `tag`, newest first.
    async fn tagged_bookmarks(&self, tag: &str) -> Result<Vec<PublicBookmark>>;

    async fn api_key_exists(&self, key: &str) -> Result<bool>;

    async fn add_api_key(&self, key: &str) -> Result<bool>;
}
