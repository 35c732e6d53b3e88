//! Multi-format parser/normalizer (C2, §4.2).
//!
//! Detection ([`FeedKind`]) and parsing are separate: `parse` is a pure
//! function of `(FeedKind, bytes)` to a [`ParsedFeed`], never re-sniffing
//! the body itself.

mod hfeed;
mod json_feed;
mod rss_atom;

use super::*;

/// The normalized result of parsing a feed body (§3).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub feed_name: Option<String>,
    /// Feed-level icon/image, used to backfill `Feed.photo` the first time
    /// it's seen (§4.4 `updateFeedAfterFetch` "discovered title/photo").
    pub feed_photo: Option<String>,
    pub items: Vec<Item>,
}

/// Failure modes a parse can produce (§7).
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed {kind:?} body: {reason}")]
    Malformed { kind: FeedKind, reason: String },
    #[error("activitypub feeds are not supported; try {suggestion}")]
    ActivityPubUnsupported { suggestion: String },
    #[error("unrecognized feed format")]
    Unknown,
}

/// Parse `body` (already known to be `kind`, from [`detect_type`]) into a
/// [`ParsedFeed`], normalizing every item's HTML through [`sanitize_html`]
/// and deriving each `uid` via [`item_uid`] (§4.2).
pub fn parse(kind: FeedKind, body: &str, feed_url: &str) -> Result<ParsedFeed, ParseError> {
    match kind {
        FeedKind::Atom => rss_atom::parse_atom(body, feed_url),
        FeedKind::Rss => rss_atom::parse_rss(body, feed_url),
        FeedKind::JsonFeed => json_feed::parse(body, feed_url),
        FeedKind::HFeed => hfeed::parse(body, feed_url),
        FeedKind::ActivityPub => Err(ParseError::ActivityPubUnsupported {
            suggestion: format!("{}/feed/", feed_url.trim_end_matches('/')),
        }),
        FeedKind::Unknown => Err(ParseError::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activitypub_is_rejected_with_suggestion() {
        let err = parse(FeedKind::ActivityPub, "{}", "https://example.org").unwrap_err();
        match err {
            ParseError::ActivityPubUnsupported { suggestion } => {
                assert_eq!(suggestion, "https://example.org/feed/");
            }
            _ => panic!("expected ActivityPubUnsupported"),
        }
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!(matches!(parse(FeedKind::Unknown, "", "https://example.org"), Err(ParseError::Unknown)));
    }
}
