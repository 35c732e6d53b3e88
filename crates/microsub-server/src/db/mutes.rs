//! Mute / Block lists (§3, §4.4).

use super::*;

impl Database {
    /// `(owner, url)`, optionally scoped to a channel; absence of a channel
    /// means a global mute (§3).
    pub async fn mute(&self, owner: &str, url: &str, channel_id: Option<i64>) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO muted (owner, url, channel_id) VALUES (?, ?, ?)")
            .bind(owner)
            .bind(url)
            .bind(channel_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn unmute(&self, owner: &str, url: &str, channel_id: Option<i64>) -> Result<()> {
        sqlx::query("DELETE FROM muted WHERE owner = ? AND url = ? AND channel_id IS ?")
            .bind(owner)
            .bind(url)
            .bind(channel_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// `(owner, channel?, item.source.url)` (§4.4).
    pub async fn is_muted(&self, owner: &str, channel_id: i64, source_url: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM muted WHERE owner = ? AND url = ? AND (channel_id IS NULL OR channel_id = ?) LIMIT 1",
        )
        .bind(owner)
        .bind(source_url)
        .bind(channel_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.is_some())
    }

    /// Always global, unique `(owner, authorUrl)` (§3).
    pub async fn block(&self, owner: &str, author_url: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO blocked (owner, author_url) VALUES (?, ?)")
            .bind(owner)
            .bind(author_url)
            .execute(self.pool())
            .await?;
        self.delete_items_by_author(owner, author_url).await?;
        Ok(())
    }

    pub async fn unblock(&self, owner: &str, author_url: &str) -> Result<()> {
        sqlx::query("DELETE FROM blocked WHERE owner = ? AND author_url = ?")
            .bind(owner)
            .bind(author_url)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// `(owner, item.author.url)` (§4.4).
    pub async fn is_blocked(&self, owner: &str, author_url: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM blocked WHERE owner = ? AND author_url = ? LIMIT 1")
            .bind(owner)
            .bind(author_url)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn block_cascades_into_item_deletion() {
        let db = Database::new(":memory:").await.unwrap();
        let channel = db.create_channel("alice", "Tech").await.unwrap();
        let mut item = core::Item::new("https://example.org/feed.xml", "a");
        item.author = Some(core::Author { name: None, url: Some("https://evil.example/".into()), photo: None });
        db.add_item(channel.id, None, &item).await.unwrap();

        db.block("alice", "https://evil.example/").await.unwrap();
        assert!(db.is_blocked("alice", "https://evil.example/").await.unwrap());

        let page = db
            .get_timeline(
                channel.id,
                TimelineQuery { owner: "alice", show_read: true, limit: 20, ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 0);
    }

    #[tokio::test]
    async fn mute_is_scoped_by_optional_channel() {
        let db = Database::new(":memory:").await.unwrap();
        let channel = db.create_channel("alice", "Tech").await.unwrap();
        db.mute("alice", "https://noisy.example/feed.xml", Some(channel.id)).await.unwrap();
        assert!(db.is_muted("alice", channel.id, "https://noisy.example/feed.xml").await.unwrap());
        assert!(!db.is_muted("alice", 9999, "https://noisy.example/feed.xml").await.unwrap());
    }
}
