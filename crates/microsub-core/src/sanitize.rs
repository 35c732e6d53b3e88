//! Strict allow-list HTML sanitizer (§4.2, §9 "Sanitizer trust").
//!
//! All HTML arriving from feeds or webmention sources must pass through this
//! before persistence. We build on `ammonia`, which already implements
//! tag/attribute allow-listing and scheme filtering -- we just configure its
//! allow-lists to match §4.2 exactly instead of writing one by hand.

use super::*;

use std::sync::LazyLock;

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "em", "figcaption",
    "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "li",
    "ol", "p", "pre", "s", "span", "strike", "strong", "sub", "sup", "table",
    "tbody", "td", "th", "thead", "tr", "u", "ul", "video", "audio", "source",
];

static SANITIZER: LazyLock<ammonia::Builder<'static>> = LazyLock::new(|| {
    let mut builder = ammonia::Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .generic_attributes(["class"].into_iter().collect())
        .add_tag_attributes("a", ["href", "title", "rel"])
        .add_tag_attributes("img", ["src", "alt", "title", "width", "height"])
        .add_tag_attributes(
            "video",
            ["src", "poster", "controls", "width", "height"],
        )
        .add_tag_attributes("audio", ["src", "controls"])
        .add_tag_attributes("source", ["src", "type"])
        .url_schemes(["http", "https", "mailto"].into_iter().collect())
        .link_rel(None);
    builder
});

/// Sanitized HTML content paired with its tag-stripped plain-text rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub html: String,
    pub text: String,
}

impl Content {
    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.text.is_empty()
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Sanitize raw (untrusted) HTML per the §4.2 allow-list and derive the
/// plain-text rendering by stripping tags from the sanitized result.
pub fn sanitize_html(raw_html: &str) -> Content {
    let html = SANITIZER.clean(raw_html).to_string();
    let text = strip_tags(&html);
    Content { html, text }
}

fn strip_tags(html: &str) -> String {
    ammonia::Builder::empty().clean(html).to_string().trim().to_string()
}
