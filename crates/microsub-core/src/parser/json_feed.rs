//! JSON Feed 1.1 normalization (§4.2).

use super::*;

#[derive(serde::Deserialize)]
struct RawFeed {
    version: String,
    title: Option<String>,
    icon: Option<String>,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(serde::Deserialize)]
struct RawItem {
    id: String,
    url: Option<String>,
    title: Option<String>,
    content_html: Option<String>,
    content_text: Option<String>,
    summary: Option<String>,
    date_published: Option<String>,
    date_modified: Option<String>,
    #[serde(default)]
    authors: Vec<RawAuthor>,
    #[serde(default)]
    tags: Vec<String>,
    image: Option<String>,
    banner_image: Option<String>,
}

#[derive(serde::Deserialize)]
struct RawAuthor {
    name: Option<String>,
    url: Option<String>,
    avatar: Option<String>,
}

pub fn parse(body: &str, feed_url: &str) -> Result<ParsedFeed, ParseError> {
    let raw: RawFeed = serde_json::from_str(body).map_err(|e| ParseError::Malformed {
        kind: FeedKind::JsonFeed,
        reason: e.to_string(),
    })?;

    if !raw.version.contains("jsonfeed.org") {
        return Err(ParseError::Malformed {
            kind: FeedKind::JsonFeed,
            reason: format!("unrecognized version string: {}", raw.version),
        });
    }

    let items = raw.items.into_iter().map(|raw_item| json_item_to_item(raw_item, feed_url)).collect();

    Ok(ParsedFeed { feed_name: raw.title, feed_photo: raw.icon, items })
}

fn json_item_to_item(raw: RawItem, feed_url: &str) -> Item {
    let mut item = Item::new(feed_url, &raw.id);

    item.url = raw.url;
    item.name = raw.title.filter(|s| !s.is_empty());
    item.published = raw.date_published.as_deref().and_then(DateTime::parse_feed_date);
    item.updated = raw.date_modified.as_deref().and_then(DateTime::parse_feed_date);
    item.summary = raw.summary;
    item.category = raw.tags;

    if let Some(url) = raw.image {
        push_media(&mut item.photo, url);
    }
    if let Some(url) = raw.banner_image {
        push_media(&mut item.photo, url);
    }

    if let Some(author) = raw.authors.into_iter().next() {
        item.author = Some(Author { name: author.name, url: author.url, photo: author.avatar });
    }

    item.content = match (raw.content_html, raw.content_text) {
        (Some(html), _) => sanitize_html(&html),
        (None, Some(text)) => Content { html: String::new(), text },
        (None, None) => Content::empty(),
    };

    item
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "https://jsonfeed.org/version/1.1",
        "title": "Example JSON Feed",
        "items": [
            {
                "id": "1",
                "url": "https://example.org/1",
                "title": "Post one",
                "content_html": "<p>hello</p>",
                "date_published": "2024-01-01T00:00:00Z",
                "tags": ["a", "b"],
                "authors": [{"name": "Jo", "url": "https://example.org/jo"}]
            }
        ]
    }"#;

    #[test]
    fn parses_items() {
        let parsed = parse(SAMPLE, "https://example.org/feed.json").unwrap();
        assert_eq!(parsed.feed_name.as_deref(), Some("Example JSON Feed"));
        let item = &parsed.items[0];
        assert_eq!(item.name.as_deref(), Some("Post one"));
        assert_eq!(item.content.html, "<p>hello</p>");
        assert_eq!(item.category, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(item.author.as_ref().unwrap().name.as_deref(), Some("Jo"));
    }

    #[test]
    fn rejects_wrong_version() {
        let bad = r#"{"version": "https://example.org/not-jsonfeed", "items": []}"#;
        assert!(parse(bad, "https://example.org/feed.json").is_err());
    }

    #[test]
    fn feed_icon_and_item_banner_image_both_surface_as_photos() {
        let body = r#"{
            "version": "https://jsonfeed.org/version/1.1",
            "title": "Example JSON Feed",
            "icon": "https://example.org/icon.png",
            "items": [
                {
                    "id": "1",
                    "image": "https://example.org/1/image.png",
                    "banner_image": "https://example.org/1/banner.png"
                }
            ]
        }"#;
        let parsed = parse(body, "https://example.org/feed.json").unwrap();
        assert_eq!(parsed.feed_photo.as_deref(), Some("https://example.org/icon.png"));
        let item = &parsed.items[0];
        assert_eq!(item.photo.len(), 2);
        assert!(item.photo.iter().any(|m| m.url == "https://example.org/1/image.png"));
        assert!(item.photo.iter().any(|m| m.url == "https://example.org/1/banner.png"));
    }
}
