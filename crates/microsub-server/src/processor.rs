//! Processor (C7, §4.6): glues Fetcher -> Parser -> Filters -> Store.

use super::*;

#[derive(Clone)]
pub struct Processor {
    db: Database,
    client: reqwest::Client,
    config: Config,
}

impl Processor {
    pub fn new(db: Database, client: reqwest::Client, config: Config) -> Self {
        Self { db, client, config }
    }

    /// Run steps 1-6 of §4.6 against a scheduled poll of `feed`.
    pub async fn process_feed(&self, feed: &Feed) -> Result<()> {
        let prior = core::ConditionalState { etag: feed.etag.clone(), last_modified: feed.last_modified.clone() };

        let fetched = core::fetch(&self.client, &feed.url, &prior, self.config.microsub.fetch_timeout).await;

        let fetched = match fetched {
            Ok(result) => result,
            Err(err) => {
                self.finish_poll(feed, core::PollOutcome::Error, None, None, None, None, None).await?;
                self.db.update_feed_status_error(feed.id, &err.to_string()).await?;
                return Ok(());
            }
        };

        let core::FetchResult::Fresh { body, content_type, etag, last_modified, hub, self_url } = fetched else {
            self.finish_poll(feed, core::PollOutcome::NoNewItems, None, None, None, None, None).await?;
            self.db.update_feed_status_success(feed.id, 0).await?;
            return Ok(());
        };

        let kind = core::detect_type(&body, content_type.as_deref());
        let parsed = match core::parse(kind, &body, &feed.url) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.finish_poll(
                    feed,
                    core::PollOutcome::Error,
                    etag.as_deref(),
                    last_modified.as_deref(),
                    None,
                    None,
                    None,
                )
                .await?;
                self.db.update_feed_status_error(feed.id, &err.to_string()).await?;
                return Ok(());
            }
        };

        let new_item_count = self.ingest_items(feed, &parsed).await?;

        let outcome = if new_item_count > 0 { core::PollOutcome::NewItems } else { core::PollOutcome::NoNewItems };
        self.finish_poll(
            feed,
            outcome,
            etag.as_deref(),
            last_modified.as_deref(),
            parsed.feed_name.as_deref(),
            parsed.feed_photo.as_deref(),
            self_url.as_deref(),
        )
        .await?;
        self.db.update_feed_status_success(feed.id, new_item_count as i64).await?;

        if let Some(hub_url) = hub {
            if feed.websub.hub.as_deref() != Some(hub_url.as_str()) {
                let topic = self_url.unwrap_or_else(|| feed.url.clone());
                self.db.set_feed_hub(feed.id, &hub_url, &topic).await?;
                self.subscribe_websub(feed.id, &hub_url, &topic).await?;
            }
        }

        Ok(())
    }

    /// Process a push-delivered body without touching tier state (§4.7
    /// "Receive"), running steps 3-6 of §4.6.
    pub async fn process_push(&self, feed: &Feed, body: &str, content_type: Option<&str>) -> Result<usize> {
        let kind = core::detect_type(body, content_type);
        let parsed = core::parse(kind, body, &feed.url)?;
        let new_item_count = self.ingest_items(feed, &parsed).await?;
        if new_item_count > 0 {
            self.db.update_feed_status_success(feed.id, new_item_count as i64).await?;
        }
        Ok(new_item_count)
    }

    async fn ingest_items(&self, feed: &Feed, parsed: &core::ParsedFeed) -> Result<usize> {
        let channel = self
            .db
            .get_channel_by_id(feed.channel_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("feed {} references a missing channel", feed.id))?;

        let regex_filter = channel.exclude_regex.as_deref().and_then(|p| core::RegexFilter::compile(p).ok());

        let mut new_item_count = 0;
        for item in &parsed.items {
            if !core::passes_type_filter(item, &channel.exclude_types) {
                continue;
            }
            if let Some(filter) = &regex_filter {
                if filter.matches(item) {
                    continue;
                }
            }
            if self.db.is_muted(&channel.owner, channel.id, &item.source.url).await? {
                continue;
            }
            if let Some(author) = &item.author {
                if let Some(url) = &author.url {
                    if self.db.is_blocked(&channel.owner, url).await? {
                        continue;
                    }
                }
            }

            if self.db.add_item(channel.id, Some(feed.id), item).await? == AddItemOutcome::Inserted {
                new_item_count += 1;
            }
        }
        Ok(new_item_count)
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_poll(
        &self,
        feed: &Feed,
        outcome: core::PollOutcome,
        etag: Option<&str>,
        last_modified: Option<&str>,
        title: Option<&str>,
        photo: Option<&str>,
        _self_url: Option<&str>,
    ) -> Result<()> {
        let next =
            core::calculate_new_tier(core::TierState { tier: feed.tier, unmodified: feed.unmodified }, outcome);
        let next_fetch_at = core::DateTime::now() + core::interval(next.tier);
        self.db
            .update_feed_after_fetch(feed.id, next.tier, next.unmodified, next_fetch_at, etag, last_modified, title, photo)
            .await?;
        Ok(())
    }

    /// Re-subscribe a feed whose lease is approaching `expires_at` (§9 "Open
    /// question -- lease renewal", resolved in SPEC_FULL.md: the scheduler
    /// re-subscribes any feed within the renewal window of its hub).
    pub async fn renew_websub_lease(&self, feed: &Feed) -> Result<()> {
        let (Some(hub), Some(topic)) = (feed.websub.hub.as_deref(), feed.websub.topic.as_deref()) else {
            return Ok(());
        };
        self.subscribe_websub(feed.id, hub, topic).await
    }

    /// Kick off a WebSub subscribe request (§4.7 "Subscribe").
    async fn subscribe_websub(&self, feed_id: i64, hub: &str, topic: &str) -> Result<()> {
        let secret = random_hex_secret();
        let callback = self.config.websub_callback_url(feed_id);

        let response = self
            .client
            .post(hub)
            .form(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", topic),
                ("hub.callback", &callback),
                ("hub.secret", &secret),
                ("hub.lease_seconds", &self.config.microsub.websub_lease_seconds.to_string()),
            ])
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().as_u16() == 202 || resp.status().as_u16() == 204 => {
                self.db.set_feed_websub_pending(feed_id, &secret).await?;
            }
            Ok(resp) => {
                tracing::warn!(feed_id, status = resp.status().as_u16(), "hub rejected subscribe request");
            }
            Err(err) => {
                tracing::warn!(feed_id, error = %err, "failed to reach hub for subscribe");
            }
        }
        Ok(())
    }
}

fn random_hex_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
