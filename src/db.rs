use crate::config::App;
use crate::model::*;
use crate::store::Store;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database as LibsqlDatabase, Row};
use std::path::Path;
use std::time::Duration;

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[
    ("001_schema.sql", include_str!("migrations/001_schema.sql")),
    ("002_api_keys.sql", include_str!("migrations/002_api_keys.sql")),
];

const BOOKMARK_COLUMNS: &str = "url, title, description, tags, ts, lease_at";

pub struct Database {
    db: LibsqlDatabase,
    conn: Connection,
    replica: bool,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_replica(turso_url: &Option<String>, turso_auth_token: &Option<String>) -> bool {
        turso_url.is_some() && turso_auth_token.is_some()
    }

    pub async fn sync(&self) -> Result<()> {
        if self.replica {
            self.db
                .sync()
                .await
                .map_err(|e| anyhow::anyhow!("sync failed: {}", e))?;
        }
        Ok(())
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    pub async fn new(app: &App, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(app.get_db());

        let db = match (&app.turso_url, &app.turso_auth_token) {
            (Some(url), Some(token)) => {
                tracing::info!("[db] running in synced database mode (offline writes)");
                let sync_interval = Duration::from_secs(app.sync_interval_seconds);
                Builder::new_synced_database(&path, url.clone(), token.clone())
                    .sync_interval(sync_interval)
                    .build()
                    .await?
            }
            _ => Builder::new_local(&path).build().await?,
        };

        let replica = Self::is_replica(&app.turso_url, &app.turso_auth_token);
        Self::init(db, replica).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::init(db, false).await
    }

    async fn init(db: LibsqlDatabase, replica: bool) -> Result<Self> {
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS.iter().chain(MIGRATIONS) {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database { db, conn, replica })
    }

    fn row_to_bookmark(row: &Row) -> Result<Bookmark> {
        let tags = match row.get::<Option<String>>(3)? {
            Some(raw) => serde_json::from_str(&raw).context("decoding stored tags")?,
            None => None,
        };
        let lease_at = match row.get::<Option<String>>(5)? {
            Some(raw) => Some(parse_ts(&raw)?),
            None => None,
        };

        Ok(Bookmark {
            url: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            tags,
            created_at: parse_ts(&row.get::<String>(4)?)?,
            lease_at,
        })
    }
}

#[async_trait]
impl Store for Database {
    async fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<bool> {
        let query = r#"
            INSERT INTO bookmarks (url, title, description, tags, ts)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
        "#;

        let tags = match &bookmark.tags {
            Some(tags) => Some(serde_json::to_string(tags)?),
            None => None,
        };

        let changed = self
            .conn
            .execute(
                query,
                libsql::params![
                    bookmark.url.as_str(),
                    bookmark.title.as_deref(),
                    bookmark.description.as_deref(),
                    tags,
                    format_ts(bookmark.created_at)
                ],
            )
            .await?;

        Ok(changed > 0)
    }

    async fn get_bookmark(&self, url: &str) -> Result<Option<Bookmark>> {
        let query = format!("SELECT {BOOKMARK_COLUMNS} FROM bookmarks WHERE url = ?");
        let mut rows = self.conn.query(&query, libsql::params![url]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_bookmark(&row)?)),
            None => Ok(None),
        }
    }

    async fn lease_candidates(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<String>> {
        let query = r#"
            SELECT url
            FROM bookmarks
            WHERE (lease_at IS NULL OR lease_at < ?)
              AND NOT EXISTS (SELECT 1 FROM crawls WHERE crawls.url = bookmarks.url)
            ORDER BY ts, url
            LIMIT ?
        "#;

        let mut rows = self
            .conn
            .query(query, libsql::params![format_ts(cutoff), limit as i64])
            .await?;

        let mut urls = vec![];
        while let Some(row) = rows.next().await? {
            urls.push(row.get::<String>(0)?);
        }
        Ok(urls)
    }

    async fn try_lease(&self, url: &str, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<bool> {
        let query = r#"
            UPDATE bookmarks
            SET lease_at = ?
            WHERE url = ?
              AND (lease_at IS NULL OR lease_at < ?)
              AND NOT EXISTS (SELECT 1 FROM crawls WHERE crawls.url = bookmarks.url)
        "#;

        let changed = self
            .conn
            .execute(query, libsql::params![format_ts(now), url, format_ts(cutoff)])
            .await?;

        Ok(changed == 1)
    }

    async fn append_crawl(&self, crawl: &NewCrawl) -> Result<()> {
        let query = "INSERT INTO crawls (url, title, body, recorded_at) VALUES (?, ?, ?, ?)";
        self.conn
            .execute(
                query,
                libsql::params![
                    crawl.url.as_str(),
                    crawl.title.as_deref(),
                    crawl.body.as_deref(),
                    format_ts(crawl.recorded_at)
                ],
            )
            .await?;
        Ok(())
    }

    async fn fill_missing_title(&self, url: &str, title: &str) -> Result<bool> {
        let query = "UPDATE bookmarks SET title = ? WHERE url = ? AND title IS NULL";
        let changed = self.conn.execute(query, libsql::params![title, url]).await?;
        Ok(changed > 0)
    }

    async fn crawl_records(&self, url: &str) -> Result<Vec<CrawlRecord>> {
        let query = "SELECT url, title, body, recorded_at FROM crawls WHERE url = ? ORDER BY id";
        let mut rows = self.conn.query(query, libsql::params![url]).await?;

        let mut records = vec![];
        while let Some(row) = rows.next().await? {
            records.push(CrawlRecord {
                url: row.get(0)?,
                title: row.get(1)?,
                body: row.get(2)?,
                recorded_at: parse_ts(&row.get::<String>(3)?)?,
            });
        }
        Ok(records)
    }

    async fn tagged_bookmarks(&self, tag: &str) -> Result<Vec<PublicBookmark>> {
        let query = r#"
            SELECT url, title, ts
            FROM bookmarks
            WHERE EXISTS (SELECT 1 FROM json_each(bookmarks.tags) WHERE json_each.value = ?)
            ORDER BY ts DESC
        "#;
        let mut rows = self.conn.query(query, libsql::params![tag]).await?;

        let mut out = vec![];
        while let Some(row) = rows.next().await? {
            out.push(PublicBookmark {
                url: row.get(0)?,
                title: row.get(1)?,
                time: parse_ts(&row.get::<String>(2)?)?,
            });
        }
        Ok(out)
    }

    async fn api_key_exists(&self, key: &str) -> Result<bool> {
        let query = "SELECT EXISTS (SELECT 1 FROM api_keys WHERE key = ?)";
        let mut rows = self.conn.query(query, libsql::params![key]).await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? == 1),
            None => Ok(false),
        }
    }

    async fn add_api_key(&self, key: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("INSERT OR IGNORE INTO api_keys (key) VALUES (?)", libsql::params![key])
            .await?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_recorded_once() {
        let db = Database::open_in_memory().await.unwrap();
        for (name, sql) in MIGRATIONS {
            Database::run_migration(db.connection(), name, sql).await.unwrap();
        }

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM _migrations", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), (SYSTEM_MIGRATIONS.len() + MIGRATIONS.len()) as i64);
    }

    #[tokio::test]
    async fn test_tags_round_trip_as_json() {
        let db = Database::open_in_memory().await.unwrap();
        let bookmark = Bookmark {
            url: "https://a".to_string(),
            title: None,
            description: Some("notes".to_string()),
            tags: Some(vec!["rust".to_string(), "db".to_string()]),
            created_at: Utc::now(),
            lease_at: None,
        };
        db.insert_bookmark(&bookmark).await.unwrap();

        let got = db.get_bookmark("https://a").await.unwrap().unwrap();
        assert_eq!(got.tags, bookmark.tags);
        assert_eq!(got.description.as_deref(), Some("notes"));
        assert_eq!(got.lease_at, None);
    }
}
