//! RSS 2.0 / Atom normalization, adapted from dual manual parsing (§4.2).

use super::*;

pub fn parse_atom(body: &str, feed_url: &str) -> Result<ParsedFeed, ParseError> {
    let feed = body.parse::<atom_syndication::Feed>().map_err(|e| ParseError::Malformed {
        kind: FeedKind::Atom,
        reason: e.to_string(),
    })?;

    let feed_name = Some(feed.title().as_str().to_string()).filter(|s| !s.is_empty());
    let feed_photo = feed.icon().or_else(|| feed.logo()).map(str::to_string);
    let items = feed.entries().iter().map(|entry| atom_entry_to_item(entry, feed_url)).collect();

    Ok(ParsedFeed { feed_name, feed_photo, items })
}

/// Route an enclosure/`media:content` URL into `item.photo`/`video`/`audio`
/// by its MIME type's top-level kind (§4.2 "Enclosures and `media:content`").
fn classify_and_push(item: &mut Item, mime_type: Option<&str>, url: String) {
    match mime_type.and_then(|m| m.split('/').next()) {
        Some("image") => push_media(&mut item.photo, url),
        Some("video") => push_media(&mut item.video, url),
        Some("audio") => push_media(&mut item.audio, url),
        _ => {}
    }
}

fn atom_entry_to_item(entry: &atom_syndication::Entry, feed_url: &str) -> Item {
    let source_id = entry.id().to_string();
    let mut item = Item::new(feed_url, &source_id);

    item.url = entry.links().first().map(|l| l.href().to_string());
    item.name = Some(entry.title().as_str().to_string()).filter(|s| !s.is_empty());
    item.published = entry
        .published()
        .map(|dt| DateTime::from_chrono(dt.to_utc()))
        .or_else(|| Some(DateTime::from_chrono(entry.updated().to_utc())));
    item.updated = Some(DateTime::from_chrono(entry.updated().to_utc()));

    if let Some(author) = entry.authors().first() {
        item.author = Some(Author {
            name: Some(author.name().to_string()).filter(|s| !s.is_empty()),
            url: author.uri().map(str::to_string),
            photo: None,
        });
    }

    let raw_html = entry
        .content()
        .and_then(|c| c.value())
        .or_else(|| entry.summary().map(|s| s.value.as_str()))
        .unwrap_or("");
    item.content = sanitize_html(raw_html);
    item.summary = entry.summary().map(|s| strip_tags(&s.value)).filter(|s| !s.is_empty());

    item.category = entry.categories().iter().map(|c| c.term().to_string()).collect();

    for link in entry.links() {
        if link.rel() == "enclosure" {
            classify_and_push(&mut item, link.mime_type(), link.href().to_string());
        }
    }

    item
}

pub fn parse_rss(body: &str, feed_url: &str) -> Result<ParsedFeed, ParseError> {
    let channel = body.parse::<rss::Channel>().map_err(|e| ParseError::Malformed {
        kind: FeedKind::Rss,
        reason: e.to_string(),
    })?;

    let feed_name = Some(channel.title().to_string()).filter(|s| !s.is_empty());
    let feed_photo = channel.image().map(|image| image.url().to_string());
    let items = channel.items().iter().map(|entry| rss_item_to_item(entry, feed_url)).collect();

    Ok(ParsedFeed { feed_name, feed_photo, items })
}

/// `media:content` entries nested under an item's generic extension map,
/// since the `rss` crate has no dedicated accessor for the Media RSS
/// namespace (§4.2).
fn media_content_entries(entry: &rss::Item) -> Vec<(String, Option<String>)> {
    entry
        .extensions()
        .get("media")
        .and_then(|ns| ns.get("content"))
        .map(|exts| {
            exts.iter()
                .filter_map(|ext| {
                    let url = ext.attrs.get("url").cloned()?;
                    let mime_type = ext.attrs.get("type").cloned();
                    Some((url, mime_type))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn rss_item_to_item(entry: &rss::Item, feed_url: &str) -> Item {
    let source_id = entry
        .guid()
        .map(|g| g.value().to_string())
        .or_else(|| entry.link().map(str::to_string))
        .or_else(|| entry.title().map(str::to_string))
        .unwrap_or_default();
    let mut item = Item::new(feed_url, &source_id);

    item.url = entry.link().map(str::to_string);
    item.name = entry.title().map(str::to_string).filter(|s| !s.is_empty());
    item.published = entry.pub_date().and_then(DateTime::parse_feed_date);
    item.author = entry.author().map(|name| Author {
        name: Some(name.to_string()),
        url: None,
        photo: None,
    });

    let raw_html = entry.content().or_else(|| entry.description()).unwrap_or("");
    item.content = sanitize_html(raw_html);
    item.summary = entry.description().map(strip_tags).filter(|s| !s.is_empty());

    item.category = entry.categories().iter().map(|c| c.name().to_string()).collect();
    if let Some(dc) = entry.dublin_core_ext() {
        item.category.extend(dc.subjects().iter().cloned());
    }

    if let Some(enclosure) = entry.enclosure() {
        classify_and_push(&mut item, Some(enclosure.mime_type()), enclosure.url().to_string());
    }
    for (url, mime_type) in media_content_entries(entry) {
        classify_and_push(&mut item, mime_type.as_deref(), url);
    }

    item
}

fn strip_tags(html: &str) -> String {
    ammonia::Builder::empty().clean(html).to_string().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <icon>https://example.org/icon.png</icon>
  <entry>
    <id>urn:uuid:1</id>
    <title>Hello</title>
    <updated>2024-01-01T00:00:00Z</updated>
    <published>2024-01-01T00:00:00Z</published>
    <link href="https://example.org/hello"/>
    <link href="https://example.org/hello.png" rel="enclosure" type="image/png"/>
    <author><name>Jo</name></author>
    <content type="html">&lt;p&gt;Hi there&lt;/p&gt;</content>
    <category term="tech"/>
  </entry>
</feed>"#;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example RSS</title>
    <image>
      <url>https://example.org/feed-icon.png</url>
      <title>Example RSS</title>
      <link>https://example.org/</link>
    </image>
    <item>
      <title>World</title>
      <link>https://example.org/world</link>
      <guid>world-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
      <description>&lt;p&gt;Hi world&lt;/p&gt;</description>
      <category>news</category>
      <enclosure url="https://example.org/world.mp3" type="audio/mpeg" length="100"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_atom_entries() {
        let parsed = parse_atom(ATOM_SAMPLE, "https://example.org/atom.xml").unwrap();
        assert_eq!(parsed.feed_name.as_deref(), Some("Example Atom"));
        assert_eq!(parsed.feed_photo.as_deref(), Some("https://example.org/icon.png"));
        assert_eq!(parsed.items.len(), 1);
        let item = &parsed.items[0];
        assert_eq!(item.name.as_deref(), Some("Hello"));
        assert_eq!(item.url.as_deref(), Some("https://example.org/hello"));
        assert_eq!(item.content.html, "<p>Hi there</p>");
        assert_eq!(item.category, vec!["tech".to_string()]);
        assert_eq!(item.photo.len(), 1);
        assert_eq!(item.photo[0].url, "https://example.org/hello.png");
    }

    #[test]
    fn parses_rss_items() {
        let parsed = parse_rss(RSS_SAMPLE, "https://example.org/rss.xml").unwrap();
        assert_eq!(parsed.feed_name.as_deref(), Some("Example RSS"));
        assert_eq!(parsed.feed_photo.as_deref(), Some("https://example.org/feed-icon.png"));
        let item = &parsed.items[0];
        assert_eq!(item.name.as_deref(), Some("World"));
        assert_eq!(item.content.html, "<p>Hi world</p>");
        assert!(item.published.is_some());
        assert_eq!(item.audio.len(), 1);
        assert_eq!(item.audio[0].url, "https://example.org/world.mp3");
    }

    #[test]
    fn malformed_atom_is_rejected() {
        assert!(parse_atom("not xml at all", "https://example.org").is_err());
    }

    #[test]
    fn media_content_extension_is_classified_by_type() {
        const SAMPLE: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example RSS</title>
    <item>
      <title>World</title>
      <link>https://example.org/world</link>
      <guid>world-1</guid>
      <media:content url="https://example.org/world.jpg" type="image/jpeg"/>
    </item>
  </channel>
</rss>"#;
        let parsed = parse_rss(SAMPLE, "https://example.org/rss.xml").unwrap();
        let item = &parsed.items[0];
        assert_eq!(item.photo.len(), 1);
        assert_eq!(item.photo[0].url, "https://example.org/world.jpg");
    }
}
