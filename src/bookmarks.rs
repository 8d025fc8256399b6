//! Idempotent bookmark ingestion.
//!
//! A batch is validated as a whole, then stored one item at a time with
//! insert-if-absent semantics. Items are not wrapped in a transaction: a
//! failure at item `k` leaves items `0..k` stored and reports how many.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::error::ArchiveError;
use crate::model::{Bookmark, BookmarkInput};
use crate::store::Store;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddSummary {
    pub inserted: usize,
    /// Items whose url already existed; their stored row was left as is.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct BookmarkStore {
    store: Arc<dyn Store>,
}

impl BookmarkStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn add(&self, inputs: Vec<BookmarkInput>) -> Result<AddSummary, ArchiveError> {
        if inputs.is_empty() {
            return Err(ArchiveError::validation("no bookmarks provided"));
        }

        if let Some(idx) = inputs.iter().position(|b| b.url.trim().is_empty()) {
            return Err(ArchiveError::validation(format!("bookmark {idx} has no url")));
        }

        let now = Utc::now();
        let mut summary = AddSummary::default();

        for (committed, input) in inputs.into_iter().enumerate() {
            let bookmark = Bookmark::from_input(input, now);

            match self.store.insert_bookmark(&bookmark).await {
                Ok(true) => summary.inserted += 1,
                Ok(false) => {
                    tracing::debug!(url = %bookmark.url, "bookmark already stored, leaving as is");
                    summary.skipped += 1;
                }
                Err(source) if committed == 0 => {
                    return Err(ArchiveError::storage("failed to add bookmark", source));
                }
                Err(source) => {
                    return Err(ArchiveError::PartialBatch {
                        committed,
                        url: bookmark.url,
                        source,
                    });
                }
            }
        }

        tracing::info!(inserted = summary.inserted, skipped = summary.skipped, "bookmarks added");
        Ok(summary)
    }

    pub async fn get(&self, url: &str) -> Result<Option<Bookmark>, ArchiveError> {
        self.store
            .get_bookmark(url)
            .await
            .map_err(|e| ArchiveError::storage("failed to get bookmark", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CrawlRecord, NewCrawl, PublicBookmark};
    use crate::store::testing::backends;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::DateTime;

    fn input(url: &str, title: Option<&str>) -> BookmarkInput {
        BookmarkInput {
            url: url.to_string(),
            title: title.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        for (name, store) in backends().await {
            let bookmarks = BookmarkStore::new(store);
            bookmarks.add(vec![input("https://a", Some("foo"))]).await.unwrap();
            let summary = bookmarks.add(vec![input("https://a", Some("bar"))]).await.unwrap();
            assert_eq!(summary, AddSummary { inserted: 0, skipped: 1 }, "{name}");

            let got = bookmarks.get("https://a").await.unwrap().unwrap();
            assert_eq!(got.title.as_deref(), Some("foo"), "{name}");
        }
    }

    #[tokio::test]
    async fn test_title_matching_url_is_stored_absent() {
        for (name, store) in backends().await {
            let bookmarks = BookmarkStore::new(store);
            bookmarks.add(vec![input("https://a", Some("https://a"))]).await.unwrap();

            let got = bookmarks.get("https://a").await.unwrap().unwrap();
            assert_eq!(got.title, None, "{name}");
        }
    }

    #[tokio::test]
    async fn test_empty_tags_are_stored_absent() {
        for (name, store) in backends().await {
            let bookmarks = BookmarkStore::new(store);
            bookmarks
                .add(vec![BookmarkInput {
                    tags: Some(vec![]),
                    ..input("https://a", None)
                }])
                .await
                .unwrap();

            let got = bookmarks.get("https://a").await.unwrap().unwrap();
            assert_eq!(got.tags, None, "{name}");
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_batch_and_blank_url() {
        let bookmarks = BookmarkStore::new(Arc::new(MemoryStore::new()));

        let err = bookmarks.add(vec![]).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Validation(_)));

        let err = bookmarks
            .add(vec![input("https://a", None), input("  ", None)])
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Validation(ref m) if m.contains("bookmark 1")));

        // validation happens before anything is written
        assert!(bookmarks.get("https://a").await.unwrap().is_none());
    }

    /// Fails every insert after the first `ok` ones.
    struct FailingStore {
        inner: MemoryStore,
        ok: usize,
        seen: tokio::sync::Mutex<usize>,
    }

    #[async_trait]
    impl Store for FailingStore {
        async fn insert_bookmark(&self, bookmark: &Bookmark) -> anyhow::Result<bool> {
            let mut seen = self.seen.lock().await;
            if *seen >= self.ok {
                anyhow::bail!("database is locked");
            }
            *seen += 1;
            self.inner.insert_bookmark(bookmark).await
        }
        async fn get_bookmark(&self, url: &str) -> anyhow::Result<Option<Bookmark>> {
            self.inner.get_bookmark(url).await
        }
        async fn lease_candidates(&self, cutoff: DateTime<Utc>, limit: usize) -> anyhow::Result<Vec<String>> {
            self.inner.lease_candidates(cutoff, limit).await
        }
        async fn try_lease(&self, url: &str, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> anyhow::Result<bool> {
            self.inner.try_lease(url, now, cutoff).await
        }
        async fn append_crawl(&self, crawl: &NewCrawl) -> anyhow::Result<()> {
            self.inner.append_crawl(crawl).await
        }
        async fn fill_missing_title(&self, url: &str, title: &str) -> anyhow::Result<bool> {
            self.inner.fill_missing_title(url, title).await
        }
        async fn crawl_records(&self, url: &str) -> anyhow::Result<Vec<CrawlRecord>> {
            self.inner.crawl_records(url).await
        }
        async fn tagged_bookmarks(&self, tag: &str) -> anyhow::Result<Vec<PublicBookmark>> {
            self.inner.tagged_bookmarks(tag).await
        }
        async fn api_key_exists(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.api_key_exists(key).await
        }
        async fn add_api_key(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.add_api_key(key).await
        }
    }

    fn failing_after(ok: usize) -> Arc<FailingStore> {
        Arc::new(FailingStore {
            inner: MemoryStore::new(),
            ok,
            seen: tokio::sync::Mutex::new(0),
        })
    }

    #[tokio::test]
    async fn test_failure_midway_keeps_committed_prefix() {
        let store = failing_after(2);
        let bookmarks = BookmarkStore::new(store.clone());

        let err = bookmarks
            .add(vec![
                input("https://a", None),
                input("https://b", None),
                input("https://c", None),
                input("https://d", None),
            ])
            .await
            .unwrap_err();

        match err {
            ArchiveError::PartialBatch { committed, url, .. } => {
                assert_eq!(committed, 2);
                assert_eq!(url, "https://c");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(store.inner.get_bookmark("https://b").await.unwrap().is_some());
        assert!(store.inner.get_bookmark("https://c").await.unwrap().is_none());
        assert!(store.inner.get_bookmark("https://d").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_on_first_item_is_plain_storage_error() {
        let bookmarks = BookmarkStore::new(failing_after(0));
        let err = bookmarks.add(vec![input("https://a", None)]).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Storage { .. }));
    }
}
