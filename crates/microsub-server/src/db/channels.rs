//! Channel & Filter Store (C5, §4.4).

use super::*;

pub const NOTIFICATIONS_SHORT_ID: &str = "notifications";
const MAX_SHORT_ID_RETRIES: u8 = 5;

/// A channel row plus its parsed filter settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub owner: String,
    pub short_id: String,
    pub name: String,
    pub display_order: i64,
    pub exclude_types: core::TypeFilter,
    pub exclude_regex: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: i64,
    owner: String,
    short_id: String,
    name: String,
    display_order: i64,
    exclude_types: String,
    exclude_regex: Option<String>,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        let kinds: Vec<core::InteractionKind> = serde_json::from_str(&row.exclude_types).unwrap_or_default();
        Channel {
            id: row.id,
            owner: row.owner,
            short_id: row.short_id,
            name: row.name,
            display_order: row.display_order,
            exclude_types: core::TypeFilter { kinds: kinds.into_iter().collect() },
            exclude_regex: row.exclude_regex,
        }
    }
}

impl Database {
    pub async fn create_channel(&self, owner: &str, name: &str) -> Result<Channel> {
        let next_order: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(display_order), 0) + 1 FROM channels WHERE owner = ? AND display_order >= 0")
                .bind(owner)
                .fetch_one(self.pool())
                .await?;

        let mut last_err = None;
        for _ in 0..MAX_SHORT_ID_RETRIES {
            let short_id = random_short_id();
            let now = core::DateTime::now().to_iso8601();
            let result = sqlx::query(
                "INSERT INTO channels (owner, short_id, name, display_order, exclude_types, exclude_regex, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, '[]', NULL, ?, ?)",
            )
            .bind(owner)
            .bind(&short_id)
            .bind(name)
            .bind(next_order)
            .bind(&now)
            .bind(&now)
            .execute(self.pool())
            .await;

            match result {
                Ok(res) => return self.get_channel_by_id(res.last_insert_rowid()).await?.ok_or_else(|| anyhow::anyhow!("channel vanished after insert")),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap().into())
    }

    /// Create the owner's notifications channel if it doesn't exist yet.
    /// Invariant: exactly one per owner, pinned at `display_order = -1`,
    /// never destroyed (§3).
    pub async fn ensure_notifications_channel(&self, owner: &str) -> Result<Channel> {
        if let Some(existing) = self.get_channel_by_short_id(owner, NOTIFICATIONS_SHORT_ID).await? {
            return Ok(existing);
        }
        let now = core::DateTime::now().to_iso8601();
        let result = sqlx::query(
            "INSERT INTO channels (owner, short_id, name, display_order, exclude_types, exclude_regex, created_at, updated_at) \
             VALUES (?, ?, 'Notifications', -1, '[]', NULL, ?, ?)",
        )
        .bind(owner)
        .bind(NOTIFICATIONS_SHORT_ID)
        .bind(&now)
        .bind(&now)
        .execute(self.pool())
        .await;

        match result {
            Ok(res) => Ok(self.get_channel_by_id(res.last_insert_rowid()).await?.expect("just inserted")),
            // Raced with a concurrent creator; fetch what they made.
            Err(_) => self
                .get_channel_by_short_id(owner, NOTIFICATIONS_SHORT_ID)
                .await?
                .ok_or_else(|| anyhow::anyhow!("notifications channel missing after insert race")),
        }
    }

    pub async fn get_channel_by_id(&self, id: i64) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as(
            "SELECT id, owner, short_id, name, display_order, exclude_types, exclude_regex FROM channels WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Channel::from))
    }

    pub async fn get_channel_by_short_id(&self, owner: &str, short_id: &str) -> Result<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as(
            "SELECT id, owner, short_id, name, display_order, exclude_types, exclude_regex FROM channels WHERE owner = ? AND short_id = ?",
        )
        .bind(owner)
        .bind(short_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Channel::from))
    }

    pub async fn list_channels(&self, owner: &str) -> Result<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(
            "SELECT id, owner, short_id, name, display_order, exclude_types, exclude_regex FROM channels \
             WHERE owner = ? ORDER BY display_order ASC",
        )
        .bind(owner)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Channel::from).collect())
    }

    pub async fn rename_channel(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query("UPDATE channels SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(core::DateTime::now().to_iso8601())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn reorder_channels(&self, owner: &str, short_ids: &[String]) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        for (index, short_id) in short_ids.iter().enumerate() {
            sqlx::query("UPDATE channels SET display_order = ? WHERE owner = ? AND short_id = ?")
                .bind(index as i64)
                .bind(owner)
                .bind(short_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_channel_filters(&self, id: i64, exclude_types: &core::TypeFilter, exclude_regex: Option<&str>) -> Result<()> {
        let kinds: Vec<core::InteractionKind> = exclude_types.kinds.iter().copied().collect();
        sqlx::query("UPDATE channels SET exclude_types = ?, exclude_regex = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(&kinds)?)
            .bind(exclude_regex)
            .bind(core::DateTime::now().to_iso8601())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Delete a channel, cascading to its Feeds and Items (§3). The
    /// notifications channel is never exposed for deletion by the API
    /// layer, but this method itself has no special case: the invariant is
    /// maintained by callers.
    pub async fn delete_channel(&self, id: i64) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM items WHERE channel_id = ?").bind(id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM feeds WHERE channel_id = ?").bind(id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM muted WHERE channel_id = ?").bind(id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM channels WHERE id = ?").bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_channel_with_incrementing_order() {
        let db = Database::new(":memory:").await.unwrap();
        let a = db.create_channel("alice", "Tech").await.unwrap();
        let b = db.create_channel("alice", "Music").await.unwrap();
        assert_eq!(a.display_order, 1);
        assert_eq!(b.display_order, 2);
    }

    #[tokio::test]
    async fn notifications_channel_is_idempotent_and_pinned() {
        let db = Database::new(":memory:").await.unwrap();
        let a = db.ensure_notifications_channel("alice").await.unwrap();
        let b = db.ensure_notifications_channel("alice").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.display_order, -1);
        assert_eq!(a.short_id, NOTIFICATIONS_SHORT_ID);
    }

    #[tokio::test]
    async fn delete_channel_cascades_to_feeds_and_items() {
        let db = Database::new(":memory:").await.unwrap();
        let channel = db.create_channel("alice", "Tech").await.unwrap();
        let feed = db.create_feed(channel.id, "https://example.org/feed.xml").await.unwrap();
        let item = core::Item::new("https://example.org/feed.xml", "a");
        db.add_item(channel.id, Some(feed.id), &item).await.unwrap();

        db.delete_channel(channel.id).await.unwrap();
        assert!(db.get_channel_by_id(channel.id).await.unwrap().is_none());
        assert!(db.get_feed_by_id(feed.id).await.unwrap().is_none());
    }
}
