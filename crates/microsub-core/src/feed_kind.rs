//! Feed variant detection (C2, §4.2).
//!
//! Rather than runtime type-sniffing scattered through the parser, detection
//! produces a tagged sum up front; `parse` is then a pure function of
//! `(FeedKind, bytes)` (§9 "Dynamic dispatch on format").


/// The feed format a body was detected (or rejected) as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Atom,
    JsonFeed,
    HFeed,
    ActivityPub,
    Unknown,
}

/// Detect the feed variant from a `Content-Type` header and/or body (§4.2).
///
/// Content-Type is authoritative when unambiguous; otherwise the body is
/// inspected.
pub fn detect_type(body: &str, content_type: Option<&str>) -> FeedKind {
    if let Some(ct) = content_type {
        let ct = ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase();
        match ct.as_str() {
            "application/feed+json" | "application/json" => return FeedKind::JsonFeed,
            "application/atom+xml" => return FeedKind::Atom,
            "text/html" => return FeedKind::HFeed,
            _ => {}
        }
    }

    let trimmed = body.trim_start();

    if trimmed.starts_with('<') {
        if trimmed.contains("xmlns=\"http://www.w3.org/2005/Atom\"")
            || trimmed.contains("<feed ")
        {
            return FeedKind::Atom;
        }
        if trimmed.starts_with("<rss") || trimmed.contains("<rss")
            || trimmed.contains("<rdf:RDF")
        {
            return FeedKind::Rss;
        }
        if trimmed.to_ascii_lowercase().starts_with("<!doctype html")
            || trimmed.starts_with("<html")
        {
            return FeedKind::HFeed;
        }
        return FeedKind::Unknown;
    }

    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(version) = value.get("version").and_then(|v| v.as_str())
            {
                if version.contains("jsonfeed.org") {
                    return FeedKind::JsonFeed;
                }
            }
            let looks_activitypub = value.get("@context").is_some()
                || value.get("inbox").is_some()
                || value
                    .get("type")
                    .and_then(|v| v.as_str())
                    .map(|t| t == "Group" || t == "OrderedCollection")
                    .unwrap_or(false);
            if looks_activitypub {
                return FeedKind::ActivityPub;
            }
        }
        return FeedKind::Unknown;
    }

    FeedKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_is_authoritative() {
        assert_eq!(
            detect_type("irrelevant", Some("application/atom+xml")),
            FeedKind::Atom
        );
        assert_eq!(
            detect_type("irrelevant", Some("application/feed+json")),
            FeedKind::JsonFeed
        );
        assert_eq!(detect_type("<p>x</p>", Some("text/html")), FeedKind::HFeed);
    }

    #[test]
    fn application_json_content_type_is_authoritative_over_activitypub_looking_body() {
        // spec.md lists `application/json` among the unambiguous Content-Types;
        // the header wins even though the body would otherwise sniff as
        // ActivityPub.
        assert_eq!(
            detect_type(
                r#"{"@context":"https://www.w3.org/ns/activitystreams","type":"OrderedCollection","inbox":"x"}"#,
                Some("application/json")
            ),
            FeedKind::JsonFeed
        );
    }

    #[test]
    fn sniffs_atom_vs_rss() {
        assert_eq!(
            detect_type(
                r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"></feed>"#,
                None
            ),
            FeedKind::Atom
        );
        assert_eq!(
            detect_type(r#"<?xml version="1.0"?><rss version="2.0"></rss>"#, None),
            FeedKind::Rss
        );
    }

    #[test]
    fn sniffs_jsonfeed_vs_activitypub() {
        assert_eq!(
            detect_type(r#"{"version":"https://jsonfeed.org/version/1.1"}"#, None),
            FeedKind::JsonFeed
        );
        assert_eq!(
            detect_type(r#"{"@context":"https://www.w3.org/ns/activitystreams","type":"OrderedCollection","inbox":"x"}"#, None),
            FeedKind::ActivityPub
        );
    }

    #[test]
    fn sniffs_hfeed_html() {
        assert_eq!(
            detect_type("<!DOCTYPE html><html></html>", None),
            FeedKind::HFeed
        );
    }
}
