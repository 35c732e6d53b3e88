//! Pure predicates backing the Channel & Filter Store (C5, §4.4).
//!
//! The store itself (channel/filter persistence, mute/block lists) lives in
//! the server crate; what's pure here is kept pure so it can be tested
//! without a database.

use super::*;

/// A channel's type filter: which [`InteractionKind`]s it excludes. An empty
/// set means "no restriction" (§4.4, spec.md "rejects if in `excludeTypes`").
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFilter {
    pub kinds: std::collections::HashSet<InteractionKind>,
}

impl std::hash::Hash for InteractionKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (*self as u8).hash(state);
    }
}

/// Does `item` pass `filter`'s type restriction (§4.4)?
pub fn passes_type_filter(item: &Item, filter: &TypeFilter) -> bool {
    filter.kinds.is_empty() || !filter.kinds.contains(&item.interaction_kind())
}

/// A compiled keyword/regex filter applied to an item's searchable text
/// (name, summary, content text, category) (§4.4).
pub struct RegexFilter {
    pattern: regex::Regex,
}

impl RegexFilter {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self { pattern: regex::RegexBuilder::new(pattern).case_insensitive(true).build()? })
    }

    /// Does `item` match this filter's pattern against its searchable text?
    pub fn matches(&self, item: &Item) -> bool {
        let haystack = searchable_text(item);
        self.pattern.is_match(&haystack)
    }
}

fn searchable_text(item: &Item) -> String {
    let mut parts = Vec::new();
    if let Some(name) = &item.name {
        parts.push(name.as_str());
    }
    if let Some(summary) = &item.summary {
        parts.push(summary.as_str());
    }
    parts.push(item.content.text.as_str());
    for cat in &item.category {
        parts.push(cat.as_str());
    }
    parts.join("\n")
}

/// Does `item`, once passed through `mute_regex` (user-muted keywords),
/// survive -- i.e. does none of the mute patterns match (§4.4)?
pub fn passes_mute_filters(item: &Item, mutes: &[RegexFilter]) -> bool {
    !mutes.iter().any(|m| m.matches(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_type_filter_admits_everything() {
        let item = Item::new("https://example.org/feed.xml", "a");
        assert!(passes_type_filter(&item, &TypeFilter::default()));
    }

    #[test]
    fn type_filter_excludes_listed_kinds() {
        let mut item = Item::new("https://example.org/feed.xml", "a");
        item.like_of.push("https://example.org/liked".into());
        let mut filter = TypeFilter::default();
        filter.kinds.insert(InteractionKind::Reply);
        assert!(passes_type_filter(&item, &filter));
        filter.kinds.insert(InteractionKind::Like);
        assert!(!passes_type_filter(&item, &filter));
    }

    #[test]
    fn regex_filter_matches_case_insensitively() {
        let mut item = Item::new("https://example.org/feed.xml", "a");
        item.name = Some("Rust Release Notes".into());
        let filter = RegexFilter::compile("rust").unwrap();
        assert!(filter.matches(&item));
        assert!(passes_mute_filters(&item, &[]));
        assert!(!passes_mute_filters(&item, &[RegexFilter::compile("rust").unwrap()]));
    }
}
