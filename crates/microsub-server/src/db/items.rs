//! Item Store (C3, §4.3).
//!
//! The cursor field named `i` in [`core::Cursor`] carries an item's `uid`
//! rather than a raw database row id -- this store has no storage-agnostic
//! notion of "id" to hand to `microsub-core`, and `uid` is already unique
//! per channel, so it serves the same tie-break role the spec's `id` does.

use super::*;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AddItemOutcome {
    Inserted,
    Duplicate,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    channel_id: i64,
    feed_id: Option<i64>,
    uid: String,
    url: Option<String>,
    name: Option<String>,
    summary: Option<String>,
    content_html: String,
    content_text: String,
    published: String,
    updated: Option<String>,
    author_name: Option<String>,
    author_url: Option<String>,
    author_photo: Option<String>,
    category: String,
    photo: String,
    video: String,
    audio: String,
    like_of: String,
    repost_of: String,
    bookmark_of: String,
    in_reply_to: String,
    source_url: String,
    source_feed_url: String,
    read_by: String,
    stripped: i64,
    notif_source: Option<String>,
    notif_target: Option<String>,
    notif_type: Option<String>,
}

/// A persisted item, jf2-shaped (§3, §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: i64,
    pub channel_id: i64,
    pub feed_id: Option<i64>,
    pub uid: String,
    pub url: Option<String>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub content: core::Content,
    pub published: core::DateTime,
    pub updated: Option<core::DateTime>,
    pub author: Option<core::Author>,
    pub category: Vec<String>,
    pub photo: Vec<core::MediaRef>,
    pub video: Vec<core::MediaRef>,
    pub audio: Vec<core::MediaRef>,
    pub like_of: Vec<String>,
    pub repost_of: Vec<String>,
    pub bookmark_of: Vec<String>,
    pub in_reply_to: Vec<String>,
    pub source: core::ItemSource,
    pub read_by: Vec<String>,
    pub stripped: bool,
    pub notif_source: Option<String>,
    pub notif_target: Option<String>,
    pub notif_type: Option<String>,
}

impl StoredItem {
    pub fn is_read_by(&self, owner: &str) -> bool {
        self.read_by.iter().any(|o| o == owner)
    }

    pub fn sort_time(&self) -> core::DateTime {
        self.published
    }

    pub fn cursor(&self) -> core::Cursor {
        core::Cursor::new(self.published, self.uid.clone())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

impl From<ItemRow> for StoredItem {
    fn from(row: ItemRow) -> Self {
        let author = if row.author_name.is_some() || row.author_url.is_some() || row.author_photo.is_some() {
            Some(core::Author { name: row.author_name, url: row.author_url, photo: row.author_photo })
        } else {
            None
        };
        StoredItem {
            id: row.id,
            channel_id: row.channel_id,
            feed_id: row.feed_id,
            uid: row.uid,
            url: row.url,
            name: row.name,
            summary: row.summary,
            content: core::Content { html: row.content_html, text: row.content_text },
            published: core::DateTime::from_iso8601(&row.published).unwrap_or_else(core::DateTime::now),
            updated: row.updated.as_deref().and_then(core::DateTime::from_iso8601),
            author,
            category: parse_list(&row.category),
            photo: parse_list(&row.photo).into_iter().map(core::MediaRef::new).collect(),
            video: parse_list(&row.video).into_iter().map(core::MediaRef::new).collect(),
            audio: parse_list(&row.audio).into_iter().map(core::MediaRef::new).collect(),
            like_of: parse_list(&row.like_of),
            repost_of: parse_list(&row.repost_of),
            bookmark_of: parse_list(&row.bookmark_of),
            in_reply_to: parse_list(&row.in_reply_to),
            source: core::ItemSource { url: row.source_url, feed_url: row.source_feed_url },
            read_by: parse_list(&row.read_by),
            stripped: row.stripped != 0,
            notif_source: row.notif_source,
            notif_target: row.notif_target,
            notif_type: row.notif_type,
        }
    }
}

const ITEM_COLUMNS: &str = "id, channel_id, feed_id, uid, url, name, summary, content_html, content_text, \
     published, updated, author_name, author_url, author_photo, category, photo, video, audio, like_of, \
     repost_of, bookmark_of, in_reply_to, source_url, source_feed_url, read_by, stripped, \
     notif_source, notif_target, notif_type";

/// A page of timeline results with opaque pagination cursors (§4.3, §6).
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct TimelinePage {
    pub items: Vec<StoredItem>,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TimelineQuery<'a> {
    pub owner: &'a str,
    pub show_read: bool,
    pub before: Option<&'a core::Cursor>,
    pub after: Option<&'a core::Cursor>,
    pub limit: u32,
}

impl Database {
    /// Idempotent insert keyed by `(channel, uid)` (§4.3). Returns whether a
    /// new record was created; duplicates -- including stripped skeletons
    /// -- are silent no-ops, which is what makes the push/poll race in §5
    /// safe.
    pub async fn add_item(&self, channel_id: i64, feed_id: Option<i64>, item: &core::Item) -> Result<AddItemOutcome> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM items WHERE channel_id = ? AND uid = ?")
            .bind(channel_id)
            .bind(&item.uid)
            .fetch_optional(self.pool())
            .await?;
        if exists.is_some() {
            return Ok(AddItemOutcome::Duplicate);
        }

        let published = item.published.unwrap_or_else(core::DateTime::now);
        sqlx::query(
            "INSERT INTO items (\
                channel_id, feed_id, uid, url, name, summary, content_html, content_text, published, updated, \
                author_name, author_url, author_photo, category, photo, video, audio, like_of, repost_of, \
                bookmark_of, in_reply_to, source_url, source_feed_url, read_by, stripped, created_at\
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', 0, ?)",
        )
        .bind(channel_id)
        .bind(feed_id)
        .bind(&item.uid)
        .bind(&item.url)
        .bind(&item.name)
        .bind(&item.summary)
        .bind(&item.content.html)
        .bind(&item.content.text)
        .bind(published.to_iso8601())
        .bind(item.updated.map(|d| d.to_iso8601()))
        .bind(item.author.as_ref().and_then(|a| a.name.clone()))
        .bind(item.author.as_ref().and_then(|a| a.url.clone()))
        .bind(item.author.as_ref().and_then(|a| a.photo.clone()))
        .bind(serde_json::to_string(&item.category)?)
        .bind(serde_json::to_string(&item.photo.iter().map(|m| &m.url).collect::<Vec<_>>())?)
        .bind(serde_json::to_string(&item.video.iter().map(|m| &m.url).collect::<Vec<_>>())?)
        .bind(serde_json::to_string(&item.audio.iter().map(|m| &m.url).collect::<Vec<_>>())?)
        .bind(serde_json::to_string(&item.like_of)?)
        .bind(serde_json::to_string(&item.repost_of)?)
        .bind(serde_json::to_string(&item.bookmark_of)?)
        .bind(serde_json::to_string(&item.in_reply_to)?)
        .bind(&item.source.url)
        .bind(&item.source.feed_url)
        .bind(core::DateTime::now().to_iso8601())
        .execute(self.pool())
        .await?;

        Ok(AddItemOutcome::Inserted)
    }

    /// Upsert a notification keyed by `(source, target)` (§4.8 "Persist").
    pub async fn upsert_notification(
        &self,
        channel_id: i64,
        item: &core::Item,
        source: &str,
        target: &str,
        notif_type: &str,
    ) -> Result<()> {
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM items WHERE channel_id = ? AND notif_source = ? AND notif_target = ?")
                .bind(channel_id)
                .bind(source)
                .bind(target)
                .fetch_optional(self.pool())
                .await?;

        if let Some((id,)) = existing {
            sqlx::query(
                "UPDATE items SET name = ?, summary = ?, content_html = ?, content_text = ?, author_name = ?, \
                 author_url = ?, author_photo = ?, notif_type = ?, updated = ? WHERE id = ?",
            )
            .bind(&item.name)
            .bind(&item.summary)
            .bind(&item.content.html)
            .bind(&item.content.text)
            .bind(item.author.as_ref().and_then(|a| a.name.clone()))
            .bind(item.author.as_ref().and_then(|a| a.url.clone()))
            .bind(item.author.as_ref().and_then(|a| a.photo.clone()))
            .bind(notif_type)
            .bind(core::DateTime::now().to_iso8601())
            .bind(id)
            .execute(self.pool())
            .await?;
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO items (\
                channel_id, feed_id, uid, url, name, summary, content_html, content_text, published, \
                author_name, author_url, author_photo, category, photo, video, audio, like_of, repost_of, \
                bookmark_of, in_reply_to, source_url, source_feed_url, read_by, stripped, \
                notif_source, notif_target, notif_type, created_at\
             ) VALUES (?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', '[]', '[]', '[]', '[]', '[]', '[]', '[]', ?, ?, '[]', 0, ?, ?, ?, ?)",
        )
        .bind(channel_id)
        .bind(&item.uid)
        .bind(source)
        .bind(&item.name)
        .bind(&item.summary)
        .bind(&item.content.html)
        .bind(&item.content.text)
        .bind(core::DateTime::now().to_iso8601())
        .bind(item.author.as_ref().and_then(|a| a.name.clone()))
        .bind(item.author.as_ref().and_then(|a| a.url.clone()))
        .bind(item.author.as_ref().and_then(|a| a.photo.clone()))
        .bind(source)
        .bind(target)
        .bind(source)
        .bind(target)
        .bind(notif_type)
        .bind(core::DateTime::now().to_iso8601())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_notification(&self, channel_id: i64, source: &str, target: &str) -> Result<()> {
        sqlx::query("DELETE FROM items WHERE channel_id = ? AND notif_source = ? AND notif_target = ?")
            .bind(channel_id)
            .bind(source)
            .bind(target)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Cursor-paginated timeline query (§4.3, §8 property 4).
    pub async fn get_timeline(&self, channel_id: i64, query: TimelineQuery<'_>) -> Result<TimelinePage> {
        let limit = query.limit.clamp(1, 100);
        let ascending = query.before.is_some();

        let mut sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE channel_id = ? AND stripped = 0");
        if !query.show_read {
            sql.push_str(" AND read_by NOT LIKE '%\"' || ? || '\"%'");
        }

        let cursor = query.before.or(query.after);
        if cursor.is_some() {
            if ascending {
                sql.push_str(" AND (published > ? OR (published = ? AND uid > ?))");
            } else {
                sql.push_str(" AND (published < ? OR (published = ? AND uid < ?))");
            }
        }

        if ascending {
            sql.push_str(" ORDER BY published ASC, uid ASC LIMIT ?");
        } else {
            sql.push_str(" ORDER BY published DESC, uid DESC LIMIT ?");
        }

        let mut q = sqlx::query_as::<_, ItemRow>(&sql).bind(channel_id);
        if !query.show_read {
            q = q.bind(query.owner);
        }
        if let Some(c) = cursor {
            let t = c.time.to_iso8601();
            q = q.bind(t.clone()).bind(t).bind(c.uid.clone());
        }
        q = q.bind((limit + 1) as i64);

        let mut rows: Vec<StoredItem> = q.fetch_all(self.pool()).await?.into_iter().map(StoredItem::from).collect();

        let has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);
        if ascending {
            rows.reverse();
        }

        let after = if ascending {
            rows.last().map(|i| i.cursor().encode())
        } else if has_more {
            rows.last().map(|i| i.cursor().encode())
        } else {
            None
        };
        let before = if ascending {
            if has_more {
                rows.first().map(|i| i.cursor().encode())
            } else {
                None
            }
        } else if query.after.is_some() {
            rows.first().map(|i| i.cursor().encode())
        } else {
            None
        };

        Ok(TimelinePage { items: rows, before, after })
    }

    /// Match `entries` by internal id, `uid`, or `url`; the sentinel
    /// `"last-read-entry"` matches every item in the channel (§4.3).
    async fn resolve_entry_ids(&self, channel_id: i64, entries: &[String]) -> Result<Vec<i64>> {
        if entries.iter().any(|e| e == "last-read-entry") {
            let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM items WHERE channel_id = ?")
                .bind(channel_id)
                .fetch_all(self.pool())
                .await?;
            return Ok(rows.into_iter().map(|(id,)| id).collect());
        }

        let mut ids = Vec::new();
        for entry in entries {
            let row: Option<(i64,)> = sqlx::query_as(
                "SELECT id FROM items WHERE channel_id = ? AND (id = ? OR uid = ? OR url = ?)",
            )
            .bind(channel_id)
            .bind(entry.parse::<i64>().unwrap_or(-1))
            .bind(entry)
            .bind(entry)
            .fetch_optional(self.pool())
            .await?;
            if let Some((id,)) = row {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Add `owner` to `readBy` for the matched entries, then run retention
    /// cleanup for `(channel, owner)` (§4.3).
    pub async fn mark_read(
        &self,
        channel_id: i64,
        entries: &[String],
        owner: &str,
        max_full_read_items: u32,
    ) -> Result<usize> {
        let ids = self.resolve_entry_ids(channel_id, entries).await?;
        let mut updated = 0;
        for id in &ids {
            let row: Option<(String,)> = sqlx::query_as("SELECT read_by FROM items WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
            let Some((raw,)) = row else { continue };
            let mut read_by: Vec<String> = parse_list(&raw);
            if !read_by.iter().any(|o| o == owner) {
                read_by.push(owner.to_string());
                sqlx::query("UPDATE items SET read_by = ? WHERE id = ?")
                    .bind(serde_json::to_string(&read_by)?)
                    .bind(id)
                    .execute(self.pool())
                    .await?;
                updated += 1;
            }
        }
        self.cleanup_retention(channel_id, owner, max_full_read_items).await?;
        Ok(updated)
    }

    pub async fn mark_unread(&self, channel_id: i64, entries: &[String], owner: &str) -> Result<usize> {
        let ids = self.resolve_entry_ids(channel_id, entries).await?;
        let mut updated = 0;
        for id in &ids {
            let row: Option<(String,)> = sqlx::query_as("SELECT read_by FROM items WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
            let Some((raw,)) = row else { continue };
            let mut read_by: Vec<String> = parse_list(&raw);
            let before = read_by.len();
            read_by.retain(|o| o != owner);
            if read_by.len() != before {
                sqlx::query("UPDATE items SET read_by = ? WHERE id = ?")
                    .bind(serde_json::to_string(&read_by)?)
                    .bind(id)
                    .execute(self.pool())
                    .await?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    pub async fn remove_entries(&self, channel_id: i64, entries: &[String]) -> Result<usize> {
        let ids = self.resolve_entry_ids(channel_id, entries).await?;
        for id in &ids {
            sqlx::query("DELETE FROM items WHERE id = ?").bind(id).execute(self.pool()).await?;
        }
        Ok(ids.len())
    }

    /// Retention state machine (§4.3, §9): keep the newest
    /// `max_full_read_items` read items per `(channel, owner)` fully; strip
    /// older feed-sourced ones (preserving the dedup guard), and
    /// hard-delete older push-only ones. Never touches unread items.
    pub async fn cleanup_retention(&self, channel_id: i64, owner: &str, max_full_read_items: u32) -> Result<()> {
        let read_ids: Vec<(i64, Option<i64>)> = sqlx::query_as(
            "SELECT id, feed_id FROM items WHERE channel_id = ? AND stripped = 0 \
             AND read_by LIKE '%\"' || ? || '\"%' ORDER BY published DESC, uid DESC",
        )
        .bind(channel_id)
        .bind(owner)
        .fetch_all(self.pool())
        .await?;

        for (id, feed_id) in read_ids.into_iter().skip(max_full_read_items as usize) {
            match feed_id {
                Some(_) => {
                    sqlx::query(
                        "UPDATE items SET stripped = 1, url = NULL, name = NULL, summary = NULL, \
                         content_html = '', content_text = '', author_name = NULL, author_url = NULL, \
                         author_photo = NULL, category = '[]', photo = '[]', video = '[]', audio = '[]', \
                         like_of = '[]', repost_of = '[]', bookmark_of = '[]', in_reply_to = '[]', \
                         source_url = '', source_feed_url = '' WHERE id = ?",
                    )
                    .bind(id)
                    .execute(self.pool())
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM items WHERE id = ?").bind(id).execute(self.pool()).await?;
                }
            }
        }
        Ok(())
    }

    /// Run retention cleanup for every `(channel, owner)` pair found in the
    /// data; called once on startup (§4.3).
    pub async fn cleanup_all_on_startup(&self, max_full_read_items: u32) -> Result<()> {
        let pairs: Vec<(i64, String)> = sqlx::query_as(
            "SELECT DISTINCT i.channel_id, json_each.value FROM items i, json_each(i.read_by) \
             WHERE i.stripped = 0",
        )
        .fetch_all(self.pool())
        .await
        .unwrap_or_default();
        for (channel_id, owner) in pairs {
            self.cleanup_retention(channel_id, &owner, max_full_read_items).await?;
        }
        Ok(())
    }

    /// Count unread items within the last `unread_retention_days`,
    /// excluding stripped items (§4.3).
    pub async fn unread_count(&self, channel_id: i64, owner: &str, unread_retention_days: i64) -> Result<i64> {
        let since = (core::DateTime::now() - core::Duration::from_days(unread_retention_days)).to_iso8601();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE channel_id = ? AND stripped = 0 AND published >= ? \
             AND read_by NOT LIKE '%\"' || ? || '\"%'",
        )
        .bind(channel_id)
        .bind(&since)
        .bind(owner)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    /// Cascade-delete items authored by `author_url` across `owner`'s
    /// channels (§4.3 "Blocking propagation").
    pub async fn delete_items_by_author(&self, owner: &str, author_url: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM items WHERE author_url = ? AND channel_id IN (SELECT id FROM channels WHERE owner = ?)",
        )
        .bind(author_url)
        .bind(owner)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// Find the owner whose channel holds an item at `target`, so an
    /// inbound webmention (C9) can be filed into that owner's
    /// notifications channel.
    pub async fn find_owner_by_item_url(&self, target: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT c.owner FROM items i JOIN channels c ON c.id = i.channel_id \
             WHERE i.url = ? AND i.stripped = 0 LIMIT 1",
        )
        .bind(target)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(owner,)| owner))
    }

    /// Weighted full-text search scoped to a channel (§4.3 index note).
    pub async fn search_items(&self, channel_id: i64, query: &str, limit: u32) -> Result<Vec<StoredItem>> {
        if query.len() > 256 {
            anyhow::bail!("search query too long");
        }
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE channel_id = ? AND stripped = 0 AND id IN (\
                SELECT rowid FROM items_fts WHERE items_fts MATCH ? \
                ORDER BY bm25(items_fts, 10.0, 5.0, 3.0, 2.0, 1.0) LIMIT ?\
             )"
        ))
        .bind(channel_id)
        .bind(query)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(StoredItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_FULL_READ_ITEMS: u32 = 200;
    const UNREAD_RETENTION_DAYS: i64 = 30;

    async fn setup() -> (Database, i64) {
        let db = Database::new(":memory:").await.unwrap();
        let channel = db.create_channel("alice", "Tech").await.unwrap();
        (db, channel.id)
    }

    #[tokio::test]
    async fn add_item_is_idempotent_by_uid() {
        let (db, channel_id) = setup().await;
        let item = core::Item::new("https://example.org/feed.xml", "guid-1");
        assert_eq!(db.add_item(channel_id, None, &item).await.unwrap(), AddItemOutcome::Inserted);
        assert_eq!(db.add_item(channel_id, None, &item).await.unwrap(), AddItemOutcome::Duplicate);
    }

    #[tokio::test]
    async fn timeline_orders_newest_first() {
        let (db, channel_id) = setup().await;
        for (id, published) in [("a", "2024-01-01T00:00:00Z"), ("b", "2024-01-02T00:00:00Z")] {
            let mut item = core::Item::new("https://example.org/feed.xml", id);
            item.published = core::DateTime::from_iso8601(published);
            db.add_item(channel_id, None, &item).await.unwrap();
        }
        let page = db
            .get_timeline(channel_id, TimelineQuery { owner: "alice", show_read: true, limit: 20, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].published > page.items[1].published);
    }

    #[tokio::test]
    async fn cursor_round_trip_is_strictly_older() {
        let (db, channel_id) = setup().await;
        for id in 0..5 {
            let mut item = core::Item::new("https://example.org/feed.xml", &id.to_string());
            item.published = core::DateTime::from_iso8601(&format!("2024-01-0{}T00:00:00Z", id + 1));
            db.add_item(channel_id, None, &item).await.unwrap();
        }
        let page1 = db
            .get_timeline(channel_id, TimelineQuery { owner: "alice", show_read: true, limit: 2, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page1.items.len(), 2);
        let after = page1.after.clone().unwrap();
        let cursor = core::Cursor::decode(&after).unwrap();

        let page2 = db
            .get_timeline(
                channel_id,
                TimelineQuery { owner: "alice", show_read: true, limit: 2, after: Some(&cursor), ..Default::default() },
            )
            .await
            .unwrap();
        assert!(page2.items[0].published < page1.items.last().unwrap().published);
    }

    #[tokio::test]
    async fn mark_read_hides_item_unless_show_read() {
        let (db, channel_id) = setup().await;
        let item = core::Item::new("https://example.org/feed.xml", "a");
        db.add_item(channel_id, None, &item).await.unwrap();
        db.mark_read(channel_id, &["last-read-entry".to_string()], "alice", MAX_FULL_READ_ITEMS).await.unwrap();

        let hidden = db
            .get_timeline(channel_id, TimelineQuery { owner: "alice", show_read: false, limit: 20, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(hidden.items.len(), 0);

        let shown = db
            .get_timeline(channel_id, TimelineQuery { owner: "alice", show_read: true, limit: 20, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(shown.items.len(), 1);
    }

    #[tokio::test]
    async fn unread_count_excludes_read_items_and_items_outside_the_window() {
        let (db, channel_id) = setup().await;

        let mut recent = core::Item::new("https://example.org/feed.xml", "recent");
        recent.published = Some(core::DateTime::now());
        db.add_item(channel_id, None, &recent).await.unwrap();

        let mut stale = core::Item::new("https://example.org/feed.xml", "stale");
        stale.published = Some(core::DateTime::now() - core::Duration::from_days(UNREAD_RETENTION_DAYS + 1));
        db.add_item(channel_id, None, &stale).await.unwrap();

        assert_eq!(db.unread_count(channel_id, "alice", UNREAD_RETENTION_DAYS).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn retention_strips_feed_sourced_items_past_the_cap() {
        let (db, channel_id) = setup().await;
        let feed_id = db.create_feed(channel_id, "https://example.org/feed.xml").await.unwrap().id;
        for i in 0..(MAX_FULL_READ_ITEMS + 2) {
            let mut item = core::Item::new("https://example.org/feed.xml", &i.to_string());
            item.published = Some(core::DateTime::now() - core::Duration::from_minutes(i as i64));
            db.add_item(channel_id, Some(feed_id), &item).await.unwrap();
        }
        db.mark_read(channel_id, &["last-read-entry".to_string()], "alice", MAX_FULL_READ_ITEMS).await.unwrap();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        let stripped: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE channel_id = ? AND stripped = 1")
            .bind(channel_id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(total, (MAX_FULL_READ_ITEMS + 2) as i64);
        assert_eq!(stripped, 2);

        // Dedup still holds: re-ingesting a stripped item's uid is a no-op.
        let mut dup = core::Item::new("https://example.org/feed.xml", "0");
        dup.published = Some(core::DateTime::now());
        assert_eq!(db.add_item(channel_id, Some(feed_id), &dup).await.unwrap(), AddItemOutcome::Duplicate);
    }

    #[tokio::test]
    async fn blocking_cascades_delete_by_author() {
        let (db, channel_id) = setup().await;
        let mut item = core::Item::new("https://example.org/feed.xml", "a");
        item.author = Some(core::Author { name: Some("Eve".into()), url: Some("https://evil.example/".into()), photo: None });
        db.add_item(channel_id, None, &item).await.unwrap();

        let removed = db.delete_items_by_author("alice", "https://evil.example/").await.unwrap();
        assert_eq!(removed, 1);
    }
}
