//! Storage layer: Item Store (C3), Feed Store (C4), Channel & Filter Store
//! (C5), and mute/block lists (§3, §4.3, §4.4).
//!
//! Schema is applied through a version-gated migration loop, the same
//! pattern the teacher uses: a `version_history` table records the last
//! applied semver, and `initialize` walks forward from there one step at a
//! time so re-running it against an up-to-date database is a no-op.

use super::*;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

mod channels;
mod feeds;
mod items;
mod mutes;

#[allow(unused_imports)]
pub use channels::*;
pub use feeds::*;
pub use items::*;
#[allow(unused_imports)]
pub use mutes::*;

/// Storage handle shared across the scheduler, processor, and API layers.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if necessary) the sqlite database at `path`, or an
    /// in-memory database for `":memory:"`.
    pub async fn new(path: impl AsRef<str>) -> Result<Self> {
        // A plain ":memory:" database is private to the connection that
        // opened it, so a pool of more than one connection would each see
        // an independent, unmigrated database. Cap in-memory pools at a
        // single connection; file-backed databases pool normally.
        let (options, max_connections) = match path.as_ref() {
            ":memory:" => (SqliteConnectOptions::from_str(":memory:")?, 1),
            _ => {
                let path = std::path::PathBuf::from(path.as_ref()).resolve().into_owned();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                (SqliteConnectOptions::new().filename(path).create_if_missing(true), 8)
            }
        };

        let pool = SqlitePoolOptions::new().min_connections(1).max_connections(max_connections).connect_with(options).await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    async fn database_version(&self) -> Option<semver::Version> {
        // Ordered by `id`, not `applied_at`: migrations can land within the
        // same timestamp tick, and insertion order is what actually matters.
        let row: Option<(String,)> =
            sqlx::query_as("SELECT version FROM version_history ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .ok()?;
        row.and_then(|(v,)| semver::Version::parse(&v).ok())
    }

    async fn record_version(&self, version: &semver::Version) -> Result<()> {
        sqlx::query("INSERT INTO version_history (version, applied_at) VALUES (?, ?)")
            .bind(version.to_string())
            .bind(core::DateTime::now().to_iso8601())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Apply schema migrations forward from whatever version is recorded.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS version_history (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                version TEXT NOT NULL, \
                applied_at TEXT NOT NULL\
            )",
        )
        .execute(&self.pool)
        .await?;

        let mut current = self.database_version().await;

        if current.is_none() {
            self.migrate_v1_0_0().await?;
            let v = semver::Version::new(1, 0, 0);
            self.record_version(&v).await?;
            current = Some(v);
        }

        if current.as_ref().unwrap() < &semver::Version::new(1, 1, 0) {
            self.migrate_v1_1_0().await?;
            self.record_version(&semver::Version::new(1, 1, 0)).await?;
        }

        Ok(())
    }

    async fn migrate_v1_0_0(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE channels (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                owner TEXT NOT NULL, \
                short_id TEXT NOT NULL, \
                name TEXT NOT NULL, \
                display_order INTEGER NOT NULL, \
                exclude_types TEXT NOT NULL DEFAULT '[]', \
                exclude_regex TEXT, \
                created_at TEXT NOT NULL, \
                updated_at TEXT NOT NULL, \
                UNIQUE (owner, short_id)\
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE feeds (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                channel_id INTEGER NOT NULL REFERENCES channels(id), \
                url TEXT NOT NULL, \
                title TEXT, \
                photo TEXT, \
                tier INTEGER NOT NULL DEFAULT 1, \
                unmodified INTEGER NOT NULL DEFAULT 0, \
                next_fetch_at TEXT NOT NULL, \
                last_fetched_at TEXT, \
                etag TEXT, \
                last_modified TEXT, \
                status TEXT NOT NULL DEFAULT 'active', \
                last_error TEXT, \
                last_error_at TEXT, \
                consecutive_errors INTEGER NOT NULL DEFAULT 0, \
                item_count INTEGER NOT NULL DEFAULT 0, \
                websub_hub TEXT, \
                websub_topic TEXT, \
                websub_secret TEXT, \
                websub_lease_seconds INTEGER, \
                websub_expires_at TEXT, \
                websub_pending INTEGER NOT NULL DEFAULT 0, \
                UNIQUE (channel_id, url)\
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX idx_feeds_next_fetch ON feeds (next_fetch_at)").execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE items (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                channel_id INTEGER NOT NULL REFERENCES channels(id), \
                feed_id INTEGER REFERENCES feeds(id), \
                uid TEXT NOT NULL, \
                url TEXT, \
                name TEXT, \
                summary TEXT, \
                content_html TEXT NOT NULL DEFAULT '', \
                content_text TEXT NOT NULL DEFAULT '', \
                published TEXT NOT NULL, \
                updated TEXT, \
                author_name TEXT, \
                author_url TEXT, \
                author_photo TEXT, \
                category TEXT NOT NULL DEFAULT '[]', \
                photo TEXT NOT NULL DEFAULT '[]', \
                video TEXT NOT NULL DEFAULT '[]', \
                audio TEXT NOT NULL DEFAULT '[]', \
                like_of TEXT NOT NULL DEFAULT '[]', \
                repost_of TEXT NOT NULL DEFAULT '[]', \
                bookmark_of TEXT NOT NULL DEFAULT '[]', \
                in_reply_to TEXT NOT NULL DEFAULT '[]', \
                source_url TEXT NOT NULL DEFAULT '', \
                source_feed_url TEXT NOT NULL DEFAULT '', \
                read_by TEXT NOT NULL DEFAULT '[]', \
                stripped INTEGER NOT NULL DEFAULT 0, \
                notif_source TEXT, \
                notif_target TEXT, \
                notif_type TEXT, \
                created_at TEXT NOT NULL, \
                UNIQUE (channel_id, uid)\
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX idx_items_timeline ON items (channel_id, published DESC, id DESC)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX idx_items_feed ON items (feed_id)").execute(&self.pool).await?;
        sqlx::query("CREATE INDEX idx_items_channel_url ON items (channel_id, url)").execute(&self.pool).await?;
        sqlx::query("CREATE INDEX idx_items_author_url ON items (author_url)").execute(&self.pool).await?;
        sqlx::query("CREATE INDEX idx_items_notif_source_target ON items (notif_source, notif_target)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE muted (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                owner TEXT NOT NULL, \
                url TEXT NOT NULL, \
                channel_id INTEGER REFERENCES channels(id), \
                UNIQUE (owner, url, channel_id)\
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE blocked (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                owner TEXT NOT NULL, \
                author_url TEXT NOT NULL, \
                UNIQUE (owner, author_url)\
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Weighted full-text index over `name(10), summary(5), content.text(3),
    /// content.html(2), author.name(1)` (§4.3), implemented as an
    /// external-content FTS5 table kept in sync by triggers.
    async fn migrate_v1_1_0(&self) -> Result<()> {
        sqlx::query(
            "CREATE VIRTUAL TABLE items_fts USING fts5(\
                name, summary, content_text, content_html, author_name, \
                content='items', content_rowid='id'\
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO items_fts (rowid, name, summary, content_text, content_html, author_name) \
             SELECT id, name, summary, content_text, content_html, author_name FROM items",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TRIGGER items_fts_ai AFTER INSERT ON items BEGIN \
                INSERT INTO items_fts (rowid, name, summary, content_text, content_html, author_name) \
                VALUES (new.id, new.name, new.summary, new.content_text, new.content_html, new.author_name); \
             END",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TRIGGER items_fts_ad AFTER DELETE ON items BEGIN \
                INSERT INTO items_fts (items_fts, rowid, name, summary, content_text, content_html, author_name) \
                VALUES ('delete', old.id, old.name, old.summary, old.content_text, old.content_html, old.author_name); \
             END",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TRIGGER items_fts_au AFTER UPDATE ON items BEGIN \
                INSERT INTO items_fts (items_fts, rowid, name, summary, content_text, content_html, author_name) \
                VALUES ('delete', old.id, old.name, old.summary, old.content_text, old.content_html, old.author_name); \
                INSERT INTO items_fts (rowid, name, summary, content_text, content_html, author_name) \
                VALUES (new.id, new.name, new.summary, new.content_text, new.content_html, new.author_name); \
             END",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Generate a random 8-char alphanumeric short id, per §4.4.
pub(crate) fn random_short_id() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..8).map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char).collect()
}

#[allow(unused)]
fn row_count(row: &sqlx::sqlite::SqliteRow) -> i64 {
    row.try_get::<i64, _>(0).unwrap_or(0)
}
