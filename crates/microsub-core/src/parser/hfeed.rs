//! h-feed / h-entry normalization via microformats2 parsing (§4.2).

use super::*;

use microformats::types::{Class, Item as MfItem, KnownClass, PropertyValue};

pub fn parse(body: &str, feed_url: &str) -> Result<ParsedFeed, ParseError> {
    let base = url::Url::parse(feed_url).map_err(|e| ParseError::Malformed {
        kind: FeedKind::HFeed,
        reason: format!("invalid feed url: {e}"),
    })?;

    let doc = microformats::from_html(body, &base).map_err(|e| ParseError::Malformed {
        kind: FeedKind::HFeed,
        reason: e.to_string(),
    })?;

    let h_feed = doc.items.iter().find(|item| has_class(item, KnownClass::Feed));

    let (feed_name, feed_photo, entries): (Option<String>, Option<String>, Vec<MfItem>) = match h_feed {
        Some(feed) => (first_text(feed, "name"), first_url(feed, "photo"), feed.children.iter().cloned().collect()),
        None => (None, None, doc.items.iter().filter(|item| has_class(item, KnownClass::Entry)).cloned().collect()),
    };

    let items = entries
        .iter()
        .filter(|entry| has_class(entry, KnownClass::Entry))
        .map(|entry| h_entry_to_item(entry, feed_url))
        .collect();

    Ok(ParsedFeed { feed_name, feed_photo, items })
}

fn has_class(item: &MfItem, class: KnownClass) -> bool {
    item.r#type.iter().any(|c| matches!(c, Class::Known(k) if *k == class))
}

/// `entry`, `event`, or `review` per the entry's h-* class (§3 `type`).
fn entry_type(entry: &MfItem) -> String {
    if has_class(entry, KnownClass::Event) {
        "event".to_string()
    } else if has_class(entry, KnownClass::Review) {
        "review".to_string()
    } else {
        "entry".to_string()
    }
}

fn h_entry_to_item(entry: &MfItem, feed_url: &str) -> Item {
    let url = first_url(entry, "url");
    let source_id = url.clone().or_else(|| first_text(entry, "name")).unwrap_or_default();
    let mut item = Item::new(feed_url, &source_id);

    item.r#type = entry_type(entry);
    item.url = url;
    item.name = first_text(entry, "name");
    item.published = first_text(entry, "published").as_deref().and_then(DateTime::parse_feed_date);
    item.updated = first_text(entry, "updated").as_deref().and_then(DateTime::parse_feed_date);
    item.category = all_text(entry, "category");

    if let Some(raw_html) = first_fragment_html(entry, "content") {
        item.content = sanitize_html(&raw_html);
    } else if let Some(summary) = first_text(entry, "summary") {
        item.content = Content { html: String::new(), text: summary };
    }
    item.summary = first_text(entry, "summary");

    for url in all_url(entry, "photo") {
        push_media(&mut item.photo, url);
    }
    for url in all_url(entry, "video") {
        push_media(&mut item.video, url);
    }
    for url in all_url(entry, "audio") {
        push_media(&mut item.audio, url);
    }

    item.like_of = all_url(entry, "like-of");
    item.repost_of = all_url(entry, "repost-of");
    item.bookmark_of = all_url(entry, "bookmark-of");
    item.in_reply_to = all_url(entry, "in-reply-to");
    item.rsvp = first_text(entry, "rsvp");
    item.checkin = first_text(entry, "checkin");

    if let Some(card) = entry.properties.get("author").and_then(|values| values.first()) {
        item.author = property_to_author(card);
    }

    item
}

fn property_to_author(value: &PropertyValue) -> Option<Author> {
    match value {
        PropertyValue::Item(card) => Some(Author {
            name: first_text(card, "name"),
            url: first_url(card, "url"),
            photo: first_url(card, "photo"),
        }),
        PropertyValue::Plain(text) => Some(Author { name: Some(text.to_string()), url: None, photo: None }),
        PropertyValue::Url(url) => Some(Author { name: None, url: Some(url.to_string()), photo: None }),
        _ => None,
    }
}

fn first_text(item: &MfItem, key: &str) -> Option<String> {
    item.properties.get(key)?.first().map(property_text)
}

fn all_text(item: &MfItem, key: &str) -> Vec<String> {
    item.properties.get(key).map(|values| values.iter().map(property_text).collect()).unwrap_or_default()
}

fn first_url(item: &MfItem, key: &str) -> Option<String> {
    item.properties.get(key)?.first().map(property_text)
}

fn all_url(item: &MfItem, key: &str) -> Vec<String> {
    all_text(item, key)
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

    const SAMPLE: &str = r##"<!DOCTYPE html><html><body>
    <div class="h-feed">
      <h1 class="p-name">Example Blog</h1>
      <article class="h-entry">
        <h2 class="p-name">First post</h2>
        <a class="u-url" href="https://example.org/first">permalink</a>
        <time class="dt-published" datetime="2024-01-01T00:00:00Z">Jan 1</time>
        <div class="e-content"><p>Hello <b>world</b></p></div>
        <a class="p-category" href="#">tech</a>
      </article>
    </body></html>"##;

    #[test]
    fn parses_h_feed_with_single_entry() {
        let parsed = parse(SAMPLE, "https://example.org/").unwrap();
        assert_eq!(parsed.feed_name.as_deref(), Some("Example Blog"));
        assert_eq!(parsed.items.len(), 1);
        let item = &parsed.items[0];
        assert_eq!(item.name.as_deref(), Some("First post"));
        assert_eq!(item.url.as_deref(), Some("https://example.org/first"));
        assert!(item.content.html.contains("Hello"));
        assert_eq!(item.category, vec!["tech".to_string()]);
    }
}
