//! Feed Store (C4, §4.4).

use super::*;

#[derive(Clone, Debug, Default)]
pub struct WebSubState {
    pub hub: Option<String>,
    pub topic: Option<String>,
    pub secret: Option<String>,
    pub lease_seconds: Option<i64>,
    pub expires_at: Option<core::DateTime>,
    pub pending: bool,
}

#[derive(Clone, Debug)]
pub struct Feed {
    pub id: i64,
    pub channel_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub photo: Option<String>,
    pub tier: u8,
    pub unmodified: u32,
    pub next_fetch_at: core::DateTime,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub status: FeedStatus,
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
    pub item_count: i64,
    pub websub: WebSubState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedStatus {
    Active,
    Error,
}

impl FeedStatus {
    fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Active => "active",
            FeedStatus::Error => "error",
        }
    }

    fn from_str(s: &str) -> Self {
        if s == "error" {
            FeedStatus::Error
        } else {
            FeedStatus::Active
        }
    }
}

#[derive(sqlx::FromRow)]
struct FeedRow {
    id: i64,
    channel_id: i64,
    url: String,
    title: Option<String>,
    photo: Option<String>,
    tier: i64,
    unmodified: i64,
    next_fetch_at: String,
    etag: Option<String>,
    last_modified: Option<String>,
    status: String,
    last_error: Option<String>,
    consecutive_errors: i64,
    item_count: i64,
    websub_hub: Option<String>,
    websub_topic: Option<String>,
    websub_secret: Option<String>,
    websub_lease_seconds: Option<i64>,
    websub_expires_at: Option<String>,
    websub_pending: i64,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            channel_id: row.channel_id,
            url: row.url,
            title: row.title,
            photo: row.photo,
            tier: row.tier as u8,
            unmodified: row.unmodified as u32,
            next_fetch_at: core::DateTime::from_iso8601(&row.next_fetch_at).unwrap_or_else(core::DateTime::now),
            etag: row.etag,
            last_modified: row.last_modified,
            status: FeedStatus::from_str(&row.status),
            last_error: row.last_error,
            consecutive_errors: row.consecutive_errors as u32,
            item_count: row.item_count,
            websub: WebSubState {
                hub: row.websub_hub,
                topic: row.websub_topic,
                secret: row.websub_secret,
                lease_seconds: row.websub_lease_seconds,
                expires_at: row.websub_expires_at.as_deref().and_then(core::DateTime::from_iso8601),
                pending: row.websub_pending != 0,
            },
        }
    }
}

const FEED_COLUMNS: &str = "id, channel_id, url, title, photo, tier, unmodified, next_fetch_at, etag, last_modified, \
     status, last_error, consecutive_errors, item_count, websub_hub, websub_topic, websub_secret, \
     websub_lease_seconds, websub_expires_at, websub_pending";

impl Database {
    /// Idempotent on `(channel, url)`: returns the existing record if
    /// present, so `follow` is safe to retry (§4.4).
    pub async fn create_feed(&self, channel_id: i64, url: &str) -> Result<Feed> {
        if let Some(existing) = self.find_feed_by_channel_url(channel_id, url).await? {
            return Ok(existing);
        }
        let now = core::DateTime::now().to_iso8601();
        let result = sqlx::query(
            "INSERT INTO feeds (channel_id, url, tier, unmodified, next_fetch_at, status, consecutive_errors, item_count, websub_pending) \
             VALUES (?, ?, 1, 0, ?, 'active', 0, 0, 0)",
        )
        .bind(channel_id)
        .bind(url)
        .bind(&now)
        .execute(self.pool())
        .await;

        match result {
            Ok(res) => Ok(self.get_feed_by_id(res.last_insert_rowid()).await?.expect("just inserted")),
            Err(_) => self
                .find_feed_by_channel_url(channel_id, url)
                .await?
                .ok_or_else(|| anyhow::anyhow!("feed missing after insert race")),
        }
    }

    pub async fn find_feed_by_channel_url(&self, channel_id: i64, url: &str) -> Result<Option<Feed>> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE channel_id = ? AND url = ?"))
                .bind(channel_id)
                .bind(url)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(Feed::from))
    }

    pub async fn get_feed_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Feed::from))
    }

    pub async fn list_feeds(&self, channel_id: i64) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE channel_id = ?"))
            .bind(channel_id)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// All feeds due for a poll: `nextFetchAt` is null or `<= now` (§4.4).
    pub async fn get_feeds_to_fetch(&self) -> Result<Vec<Feed>> {
        let now = core::DateTime::now().to_iso8601();
        let rows: Vec<FeedRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE next_fetch_at <= ?"))
                .bind(&now)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Persist the post-fetch tier/cadence state, plus validators and any
    /// newly discovered title/photo (only if not already set) (§4.4, §4.5).
    #[allow(clippy::too_many_arguments)]
    pub async fn update_feed_after_fetch(
        &self,
        feed_id: i64,
        tier: u8,
        unmodified: u32,
        next_fetch_at: core::DateTime,
        etag: Option<&str>,
        last_modified: Option<&str>,
        title: Option<&str>,
        photo: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE feeds SET tier = ?, unmodified = ?, next_fetch_at = ?, etag = COALESCE(?, etag), \
             last_modified = COALESCE(?, last_modified), title = COALESCE(title, ?), photo = COALESCE(photo, ?) \
             WHERE id = ?",
        )
        .bind(tier as i64)
        .bind(unmodified as i64)
        .bind(next_fetch_at.to_iso8601())
        .bind(etag)
        .bind(last_modified)
        .bind(title)
        .bind(photo)
        .bind(feed_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update_feed_status_success(&self, feed_id: i64, item_count_delta: i64) -> Result<()> {
        sqlx::query(
            "UPDATE feeds SET status = 'active', consecutive_errors = 0, last_error = NULL, \
             item_count = item_count + ? WHERE id = ?",
        )
        .bind(item_count_delta)
        .bind(feed_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update_feed_status_error(&self, feed_id: i64, message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE feeds SET status = 'error', last_error = ?, last_error_at = ?, \
             consecutive_errors = consecutive_errors + 1 WHERE id = ?",
        )
        .bind(message)
        .bind(core::DateTime::now().to_iso8601())
        .bind(feed_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn set_feed_hub(&self, feed_id: i64, hub: &str, topic: &str) -> Result<()> {
        sqlx::query("UPDATE feeds SET websub_hub = ?, websub_topic = ? WHERE id = ?")
            .bind(hub)
            .bind(topic)
            .bind(feed_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_feed_websub_pending(&self, feed_id: i64, secret: &str) -> Result<()> {
        sqlx::query("UPDATE feeds SET websub_secret = ?, websub_pending = 1 WHERE id = ?")
            .bind(secret)
            .bind(feed_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn confirm_feed_websub(&self, feed_id: i64, lease_seconds: i64, expires_at: core::DateTime) -> Result<()> {
        sqlx::query("UPDATE feeds SET websub_lease_seconds = ?, websub_expires_at = ?, websub_pending = 0 WHERE id = ?")
            .bind(lease_seconds)
            .bind(expires_at.to_iso8601())
            .bind(feed_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn clear_feed_websub(&self, feed_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE feeds SET websub_secret = NULL, websub_lease_seconds = NULL, \
             websub_expires_at = NULL, websub_pending = 0 WHERE id = ?",
        )
        .bind(feed_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Feeds with an active WebSub lease expiring within `within`, which
    /// should be re-subscribed (§4.7, §9 open question).
    pub async fn feeds_needing_websub_renewal(&self, within: core::Duration) -> Result<Vec<Feed>> {
        let threshold = (core::DateTime::now() + within).to_iso8601();
        let rows: Vec<FeedRow> = sqlx::query_as(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE websub_expires_at IS NOT NULL \
             AND websub_expires_at <= ? AND websub_pending = 0"
        ))
        .bind(&threshold)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Delete a feed, cascading to its Items (§3).
    pub async fn delete_feed(&self, id: i64) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM items WHERE feed_id = ?").bind(id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM feeds WHERE id = ?").bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
