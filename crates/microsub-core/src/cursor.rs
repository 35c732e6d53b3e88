//! Opaque timeline pagination cursor (§4.3, §9).
//!
//! Encodes `(sort_time, uid)` as `base64url(json({t, i}))` so clients treat
//! it as opaque while the server gets a stable keyset-pagination key.

use super::*;

use base64::Engine;

/// Decoded cursor position: the sort timestamp and uid of the last item on
/// the previous page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "t")]
    pub time: DateTime,
    #[serde(rename = "i")]
    pub uid: String,
}

impl Cursor {
    pub fn new(time: DateTime, uid: impl Into<String>) -> Self {
        Self { time, uid: uid.into() }
    }

    /// Derive the cursor pointing at `item`'s position in the timeline.
    pub fn for_item(item: &Item) -> Self {
        Self::new(item.sort_time(), item.uid.clone())
    }

    /// Encode as an opaque, URL-safe token.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("Cursor serializes infallibly");
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a token produced by [`Cursor::encode`]. Malformed or tampered
    /// tokens are rejected rather than partially trusted (§7).
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cursor = Cursor::new(DateTime::epoch(), "abc123");
        let token = cursor.encode();
        assert_eq!(Cursor::decode(&token), Some(cursor));
    }

    #[test]
    fn rejects_garbage_tokens() {
        assert_eq!(Cursor::decode("not valid base64!!"), None);
        assert_eq!(
            Cursor::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"{}")),
            None
        );
    }

    #[test]
    fn for_item_uses_sort_time_and_uid() {
        let mut item = Item::new("https://example.org/feed.xml", "a");
        item.published = Some(DateTime::epoch());
        let cursor = Cursor::for_item(&item);
        assert_eq!(cursor.time, DateTime::epoch());
        assert_eq!(cursor.uid, item.uid);
    }
}
