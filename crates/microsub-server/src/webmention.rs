//! Webmention Receiver + Verifier (C9, §4.8).

use super::*;

/// Validate `source`/`target` are absolute URLs (§4.8 "Receive"). The caller
/// is expected to respond 202 immediately and hand the pair to
/// [`process`] in the background.
pub fn validate_request(source: &str, target: &str) -> Result<(), ApiError> {
    let is_absolute = |u: &str| url::Url::parse(u).map(|parsed| parsed.scheme() == "http" || parsed.scheme() == "https").unwrap_or(false);
    if !is_absolute(source) || !is_absolute(target) {
        return Err(ApiError::Validation("source and target must be absolute http(s) URLs".into()));
    }
    Ok(())
}

/// Fetch `source`, verify it references `target`, classify, and persist or
/// retract the notification (§4.8 "Verify", "Persist"). Failures here are
/// never surfaced to the sender beyond the original 202 (§7).
pub async fn process(client: &reqwest::Client, db: &Database, source: &str, target: &str) {
    if let Err(err) = process_inner(client, db, source, target).await {
        tracing::debug!(source, target, error = %err, "webmention verification did not persist an entry");
    }
}

async fn process_inner(client: &reqwest::Client, db: &Database, source: &str, target: &str) -> Result<()> {
    let Some(owner) = db.find_owner_by_item_url(target).await? else {
        return Ok(());
    };

    let response = client.get(source).send().await?;
    if !response.status().is_success() {
        db.delete_notification(db.ensure_notifications_channel(&owner).await?.id, source, target).await?;
        return Ok(());
    }
    let body = response.text().await?;

    if !core::references_target(&body, target) {
        let channel = db.ensure_notifications_channel(&owner).await?;
        db.delete_notification(channel.id, source, target).await?;
        return Ok(());
    }

    let Some(mention) = core::extract_mention(&body, source, target) else {
        return Ok(());
    };

    let notif_type = match mention.kind {
        core::MentionKind::Like => "like",
        core::MentionKind::Repost => "repost",
        core::MentionKind::Bookmark => "bookmark",
        core::MentionKind::Reply => "reply",
        core::MentionKind::Mention => "mention",
    };

    let mut item = core::Item::new(source, target);
    item.url = Some(source.to_string());
    item.name = mention.name;
    item.summary = mention.summary;
    item.content = mention.content;
    item.author = mention.author;
    item.in_reply_to = if notif_type == "reply" { vec![target.to_string()] } else { Vec::new() };

    let channel = db.ensure_notifications_channel(&owner).await?;
    db.upsert_notification(channel.id, &item, source, target, notif_type).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_urls() {
        assert!(validate_request("/post/1", "https://me.example/post/1").is_err());
    }

    #[test]
    fn accepts_absolute_https_urls() {
        assert!(validate_request("https://writer.example/reply", "https://me.example/post/1").is_ok());
    }

    #[tokio::test]
    async fn unknown_target_is_a_silent_no_op() {
        let db = Database::new(":memory:").await.unwrap();
        let client = reqwest::Client::new();
        process(&client, &db, "https://writer.example/reply", "https://me.example/unknown-post").await;
    }
}
