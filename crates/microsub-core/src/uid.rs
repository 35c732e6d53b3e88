//! Stable per-feed item identifiers (§3, §4.2).


use sha2::{Digest, Sha256};

/// `uid = hex24(SHA-256(feedUrl + "::" + sourceId))`.
///
/// `sourceId` is the feed's own guid when present, else the item url, else
/// its name -- callers resolve that precedence before calling this.
pub fn item_uid(feed_url: &str, source_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(feed_url.as_bytes());
    hasher.update(b"::");
    hasher.update(source_id.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(12).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_is_24_hex_chars_and_stable() {
        let a = item_uid("https://example.org/feed.xml", "guid-1");
        let b = item_uid("https://example.org/feed.xml", "guid-1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 24);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn uid_differs_by_feed() {
        let a = item_uid("https://example.org/feed.xml", "guid-1");
        let b = item_uid("https://example.com/feed.xml", "guid-1");
        assert_ne!(a, b);
    }
}
