//! Webmention source-side parsing (C9, §4.8).
//!
//! Shares the microformats2 machinery the h-feed parser (C2) uses, since
//! classifying a webmention is the same kind of "find the h-entry and read
//! its interaction properties" work, just anchored on a `target` URL
//! instead of iterating every entry.

use super::*;

use microformats::types::{Class, Item as MfItem, KnownClass, PropertyValue};

/// A mention's classification, in the precedence order of §4.8 "Verify".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MentionKind {
    Like,
    Repost,
    Bookmark,
    Reply,
    Mention,
}

/// What a verified webmention contributes to its notification record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionResult {
    pub kind: MentionKind,
    pub author: Option<Author>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub content: Content,
}

/// Does `body` contain a link back to `target` (ignoring a trailing slash
/// on either side)?
pub fn references_target(body: &str, target: &str) -> bool {
    let normalized_target = target.trim_end_matches('/');
    let needle_quoted = format!("href=\"{normalized_target}");
    let needle_quoted_slash = format!("href=\"{normalized_target}/");
    let needle_single = format!("href='{normalized_target}");
    body.contains(&needle_quoted) || body.contains(&needle_quoted_slash) || body.contains(&needle_single)
}

/// Parse `body` as the webmention source and classify its reference to
/// `target`, per §4.8 "Verify".
pub fn extract_mention(body: &str, source_url: &str, target: &str) -> Option<MentionResult> {
    let base = url::Url::parse(source_url).ok()?;
    let doc = microformats::from_html(body, &base).ok()?;

    let normalized_target = target.trim_end_matches('/');

    let entry = doc.items.iter().find_map(|item| find_entry_referencing(item, normalized_target));

    let Some(entry) = entry else {
        // No classifiable h-entry, but the plain-text link check already
        // passed (see `references_target`) -- treat as a bare mention.
        return Some(MentionResult {
            kind: MentionKind::Mention,
            author: page_level_author(&doc),
            name: None,
            summary: None,
            content: Content::empty(),
        });
    };

    let kind = classify(&entry, normalized_target);
    let author = entry_author(&entry).or_else(|| page_level_author(&doc));
    let name = first_text(&entry, "name");
    let content = first_fragment_html(&entry, "content").as_deref().map(sanitize_html).unwrap_or_else(|| {
        first_text(&entry, "summary")
            .or_else(|| name.clone())
            .map(|s| Content { html: String::new(), text: s })
            .unwrap_or_default()
    });

    Some(MentionResult { kind, author, name, summary: first_text(&entry, "summary"), content })
}

fn find_entry_referencing(item: &MfItem, target: &str) -> Option<MfItem> {
    if has_class(item, KnownClass::Entry) && entry_references(item, target) {
        return Some(item.clone());
    }
    item.children.iter().find_map(|child| find_entry_referencing(child, target))
}

fn entry_references(item: &MfItem, target: &str) -> bool {
    for key in ["like-of", "repost-of", "bookmark-of", "in-reply-to"] {
        if all_url(item, key).iter().any(|u| u.trim_end_matches('/') == target) {
            return true;
        }
    }
    false
}

fn classify(item: &MfItem, target: &str) -> MentionKind {
    for (key, kind) in [
        ("like-of", MentionKind::Like),
        ("repost-of", MentionKind::Repost),
        ("bookmark-of", MentionKind::Bookmark),
        ("in-reply-to", MentionKind::Reply),
    ] {
        if all_url(item, key).iter().any(|u| u.trim_end_matches('/') == target) {
            return kind;
        }
    }
    MentionKind::Mention
}

fn has_class(item: &MfItem, class: KnownClass) -> bool {
    item.r#type.iter().any(|c| matches!(c, Class::Known(k) if *k == class))
}

fn entry_author(item: &MfItem) -> Option<Author> {
    let card = item.properties.get("author")?.first()?;
    property_to_author(card)
}

fn page_level_author(doc: &microformats::types::Document) -> Option<Author> {
    doc.items.iter().find(|item| has_class(item, KnownClass::Card)).map(|card| Author {
        name: first_text(card, "name"),
        url: first_url(card, "url"),
        photo: first_url(card, "photo"),
    })
}

fn property_to_author(value: &PropertyValue) -> Option<Author> {
    match value {
        PropertyValue::Item(card) => {
            Some(Author { name: first_text(card, "name"), url: first_url(card, "url"), photo: first_url(card, "photo") })
        }
        PropertyValue::Plain(text) => Some(Author { name: Some(text.to_string()), url: None, photo: None }),
        PropertyValue::Url(url) => Some(Author { name: None, url: Some(url.to_string()), photo: None }),
        _ => None,
    }
}

fn first_text(item: &MfItem, key: &str) -> Option<String> {
    item.properties.get(key)?.first().map(property_text)
}

fn first_url(item: &MfItem, key: &str) -> Option<String> {
    first_text(item, key)
}

fn all_url(item: &MfItem, key: &str) -> Vec<String> {
    item.properties.get(key).map(|values| values.iter().map(property_text).collect()).unwrap_or_default()
}

fn first_fragment_html(item: &MfItem, key: &str) -> Option<String> {
    item.properties.get(key)?.iter().find_map(|value| match value {
        PropertyValue::Fragment(fragment) => Some(fragment.html.clone()),
        _ => None,
    })
}

fn property_text(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Plain(text) => text.to_string(),
        PropertyValue::Url(url) => url.to_string(),
        PropertyValue::Temporal(temporal) => temporal.to_string(),
        PropertyValue::Fragment(fragment) => fragment.value.clone(),
        PropertyValue::Image(image) => image.value.to_string(),
        PropertyValue::Item(nested) => first_text(nested, "name").unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_target_ignores_trailing_slash() {
        let body = r#"<a href="https://me.example/post/1/">reply</a>"#;
        assert!(references_target(body, "https://me.example/post/1"));
    }

    #[test]
    fn classifies_reply_by_precedence() {
        let body = r##"<div class="h-entry">
            <a class="u-in-reply-to" href="https://me.example/post/1">re</a>
            <a class="p-author h-card" href="https://writer.example/">Writer</a>
            <div class="e-content">thoughts</div>
        </div>"##;
        let result = extract_mention(body, "https://writer.example/reply", "https://me.example/post/1").unwrap();
        assert_eq!(result.kind, MentionKind::Reply);
        assert_eq!(result.author.unwrap().url.as_deref(), Some("https://writer.example/"));
        assert!(result.content.html.contains("thoughts"));
    }

    #[test]
    fn content_falls_back_to_name_when_no_content_or_summary() {
        let body = r##"<div class="h-entry">
            <a class="u-in-reply-to" href="https://me.example/post/1">re</a>
            <p class="p-name">Just a title, no content</p>
        </div>"##;
        let result = extract_mention(body, "https://writer.example/reply", "https://me.example/post/1").unwrap();
        assert_eq!(result.name.as_deref(), Some("Just a title, no content"));
        assert_eq!(result.content.text, "Just a title, no content");
    }

    #[test]
    fn like_takes_precedence_over_reply() {
        let body = r##"<div class="h-entry">
            <a class="u-like-of" href="https://me.example/post/1">like</a>
            <a class="u-in-reply-to" href="https://me.example/post/1">re</a>
        </div>"##;
        let result = extract_mention(body, "https://writer.example/reply", "https://me.example/post/1").unwrap();
        assert_eq!(result.kind, MentionKind::Like);
    }
}
