//! The uniform item representation every feed format normalizes into (§3).

use super::*;

/// Kind of interaction an item represents, derived from its interaction
/// properties (§4.4). `Post` is the default when none are present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    Post,
    Like,
    Repost,
    Bookmark,
    Reply,
    Rsvp,
    Checkin,
}

/// A single piece of attached media (§3 `photo`/`video`/`audio`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub alt: Option<String>,
}

impl MediaRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), alt: None }
    }
}

/// Append `url` to `list` unless it's already present, per spec.md's
/// "deduplicated by URL" rule for enclosures/`media:content` (§4.2).
pub fn push_media(list: &mut Vec<MediaRef>, url: String) {
    if !list.iter().any(|m| m.url == url) {
        list.push(MediaRef::new(url));
    }
}

/// Where an item's source feed pointed, kept for attribution and re-fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSource {
    pub url: String,
    pub feed_url: String,
}

/// The author of an item or feed, per h-card / Atom `<author>` / JSON Feed
/// `authors[]` (§3).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: Option<String>,
    pub url: Option<String>,
    pub photo: Option<String>,
}

/// The normalized representation every parser (C2) produces, regardless of
/// source format (§3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub uid: String,
    pub url: Option<String>,
    /// `entry`, `event`, `review`, … (§3) -- the source microformat/feed
    /// entry kind, independent of [`InteractionKind`].
    pub r#type: String,
    pub name: Option<String>,
    pub published: Option<DateTime>,
    pub updated: Option<DateTime>,
    pub author: Option<Author>,
    pub content: Content,
    pub summary: Option<String>,
    pub category: Vec<String>,
    pub photo: Vec<MediaRef>,
    pub video: Vec<MediaRef>,
    pub audio: Vec<MediaRef>,
    pub like_of: Vec<String>,
    pub repost_of: Vec<String>,
    pub bookmark_of: Vec<String>,
    pub in_reply_to: Vec<String>,
    pub rsvp: Option<String>,
    pub checkin: Option<String>,
    pub source: ItemSource,
}

impl Item {
    /// Build the minimal item for a given `(feedUrl, sourceId)` pair,
    /// computing [`uid`](Item::uid) from them per §4.2.
    pub fn new(feed_url: impl Into<String>, source_id: &str) -> Self {
        let feed_url = feed_url.into();
        let uid = item_uid(&feed_url, source_id);
        Item {
            uid,
            url: None,
            r#type: "entry".to_string(),
            name: None,
            published: None,
            updated: None,
            author: None,
            content: Content::empty(),
            summary: None,
            category: Vec::new(),
            photo: Vec::new(),
            video: Vec::new(),
            audio: Vec::new(),
            like_of: Vec::new(),
            repost_of: Vec::new(),
            bookmark_of: Vec::new(),
            in_reply_to: Vec::new(),
            rsvp: None,
            checkin: None,
            source: ItemSource { url: String::new(), feed_url },
        }
    }

    /// The timestamp used for timeline ordering: `published`, falling back
    /// to `updated`, falling back to the current time (§4.3).
    pub fn sort_time(&self) -> DateTime {
        self.published.or(self.updated).unwrap_or_else(DateTime::now)
    }

    /// Derive this item's [`InteractionKind`] from its interaction arrays,
    /// in like-of > repost-of > bookmark-of > in-reply-to > rsvp > checkin
    /// precedence (§4.4).
    pub fn interaction_kind(&self) -> InteractionKind {
        if !self.like_of.is_empty() {
            InteractionKind::Like
        } else if !self.repost_of.is_empty() {
            InteractionKind::Repost
        } else if !self.bookmark_of.is_empty() {
            InteractionKind::Bookmark
        } else if !self.in_reply_to.is_empty() {
            InteractionKind::Reply
        } else if self.rsvp.is_some() {
            InteractionKind::Rsvp
        } else if self.checkin.is_some() {
            InteractionKind::Checkin
        } else {
            InteractionKind::Post
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_matches_standalone_item_uid() {
        let item = Item::new("https://example.org/feed.xml", "guid-1");
        assert_eq!(item.uid, item_uid("https://example.org/feed.xml", "guid-1"));
    }

    #[test]
    fn interaction_kind_precedence() {
        let mut item = Item::new("https://example.org/feed.xml", "x");
        item.repost_of.push("https://example.org/a".into());
        item.in_reply_to.push("https://example.org/b".into());
        assert_eq!(item.interaction_kind(), InteractionKind::Repost);
    }

    #[test]
    fn rsvp_and_checkin_fall_after_in_reply_to() {
        let mut item = Item::new("https://example.org/feed.xml", "x");
        item.rsvp = Some("yes".into());
        item.checkin = Some("venue".into());
        assert_eq!(item.interaction_kind(), InteractionKind::Rsvp);

        item.rsvp = None;
        assert_eq!(item.interaction_kind(), InteractionKind::Checkin);

        item.in_reply_to.push("https://example.org/b".into());
        assert_eq!(item.interaction_kind(), InteractionKind::Reply);
    }

    #[test]
    fn sort_time_falls_back_to_updated() {
        let mut item = Item::new("https://example.org/feed.xml", "x");
        let t = DateTime::epoch();
        item.updated = Some(t);
        assert_eq!(item.sort_time(), t);
    }
}
