//! WebSub Subscriber + Callback Handler (C8, §4.7).

use super::*;

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, thiserror::Error)]
pub enum WebSubError {
    #[error("unknown feed")]
    UnknownFeed,
    #[error("topic mismatch")]
    TopicMismatch,
    #[error("signature missing or malformed")]
    MissingSignature,
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Verify a hub's GET callback challenge (§4.7 "Verify"). Returns the
/// challenge to echo back verbatim on success.
pub async fn verify_subscription(
    db: &Database,
    feed_id: i64,
    topic: &str,
    challenge: &str,
    lease_seconds: i64,
) -> Result<String, WebSubError> {
    let feed = db.get_feed_by_id(feed_id).await.map_err(|_| WebSubError::UnknownFeed)?.ok_or(WebSubError::UnknownFeed)?;

    let expected_topic = feed.websub.topic.as_deref().unwrap_or(&feed.url);
    if topic != feed.url && topic != expected_topic {
        return Err(WebSubError::TopicMismatch);
    }

    let expires_at = core::DateTime::now() + core::Duration::from_seconds(lease_seconds);
    db.confirm_feed_websub(feed_id, lease_seconds, expires_at).await.map_err(|_| WebSubError::UnknownFeed)?;

    Ok(challenge.to_string())
}

/// Verify the `X-Hub-Signature-256` (or legacy `X-Hub-Signature`) header
/// against the feed's stored secret, in constant time (§4.7 "Receive", §8
/// property 6).
pub fn verify_signature(secret: &str, signature_header: &str, body: &[u8]) -> Result<(), WebSubError> {
    if let Some(hex_sig) = signature_header.strip_prefix("sha256=") {
        let provided = hex_to_bytes(hex_sig).ok_or(WebSubError::MissingSignature)?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(body);
        return mac.verify_slice(&provided).map_err(|_| WebSubError::SignatureMismatch);
    }

    if let Some(hex_sig) = signature_header.strip_prefix("sha1=") {
        let provided = hex_to_bytes(hex_sig).ok_or(WebSubError::MissingSignature)?;
        let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(body);
        return mac.verify_slice(&provided).map_err(|_| WebSubError::SignatureMismatch);
    }

    Err(WebSubError::MissingSignature)
}

fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len()).step_by(2).map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok()).collect()
}

/// POST `hub.mode=unsubscribe` on feed deletion; the hub's response beyond
/// 202/204 is ignored (§4.7 "Unsubscribe").
pub async fn unsubscribe(client: &reqwest::Client, db: &Database, config: &Config, feed: &Feed) -> Result<()> {
    if let (Some(hub), Some(topic)) = (&feed.websub.hub, &feed.websub.topic) {
        let callback = config.websub_callback_url(feed.id);
        let _ = client
            .post(hub)
            .form(&[("hub.mode", "unsubscribe"), ("hub.topic", topic.as_str()), ("hub.callback", &callback)])
            .send()
            .await;
    }
    db.clear_feed_websub(feed.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let secret = "topsecret";
        let body = b"hello world";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let tag = mac.finalize().into_bytes();
        let header = format!("sha256={}", tag.iter().map(|b| format!("{b:02x}")).collect::<String>());

        assert!(verify_signature(secret, &header, body).is_ok());
        assert!(verify_signature("wrong", &header, body).is_err());
    }

    #[test]
    fn rejects_malformed_signature_header() {
        assert!(verify_signature("secret", "not-a-signature", b"body").is_err());
    }

    #[test]
    fn falls_back_to_legacy_sha1_signature() {
        let secret = "topsecret";
        let body = b"hello world";
        let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let tag = mac.finalize().into_bytes();
        let header = format!("sha1={}", tag.iter().map(|b| format!("{b:02x}")).collect::<String>());

        assert!(verify_signature(secret, &header, body).is_ok());
        assert!(verify_signature("wrong", &header, body).is_err());
    }

    #[tokio::test]
    async fn verify_subscription_rejects_unknown_feed() {
        let db = Database::new(":memory:").await.unwrap();
        let err = verify_subscription(&db, 9999, "https://example.org/feed", "chal", 604_800).await.unwrap_err();
        assert!(matches!(err, WebSubError::UnknownFeed));
    }

    #[tokio::test]
    async fn verify_subscription_rejects_topic_mismatch() {
        let db = Database::new(":memory:").await.unwrap();
        let channel = db.create_channel("alice", "Tech").await.unwrap();
        let feed = db.create_feed(channel.id, "https://example.org/feed.xml").await.unwrap();
        let err = verify_subscription(&db, feed.id, "https://wrong.example/", "chal", 604_800).await.unwrap_err();
        assert!(matches!(err, WebSubError::TopicMismatch));
    }

    #[tokio::test]
    async fn verify_subscription_persists_lease() {
        let db = Database::new(":memory:").await.unwrap();
        let channel = db.create_channel("alice", "Tech").await.unwrap();
        let feed = db.create_feed(channel.id, "https://example.org/feed.xml").await.unwrap();
        let challenge = verify_subscription(&db, feed.id, &feed.url, "chal-123", 604_800).await.unwrap();
        assert_eq!(challenge, "chal-123");
        let updated = db.get_feed_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(updated.websub.lease_seconds, Some(604_800));
        assert!(!updated.websub.pending);
    }
}
