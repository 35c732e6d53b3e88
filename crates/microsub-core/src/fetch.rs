//! Conditional-GET fetcher (C1, §4.1).


/// Default fetch timeout for scheduled polls.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
/// Shorter timeout used for one-shot feed discovery requests.
pub const DISCOVERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(12);

const ACCEPT_HEADER: &str =
    "application/atom+xml, application/rss+xml, application/feed+json, application/json;q=0.9, text/html;q=0.8, */*;q=0.1";
const USER_AGENT: &str = concat!("microsub/", env!("CARGO_PKG_VERSION"), " (+https://github.com/microsub)");

/// Failure modes a fetch can produce (§7).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("http error: {status}")]
    Http { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// The result of a successful conditional fetch.
#[derive(Debug)]
pub enum FetchResult {
    /// The server returned 304, or its body is unchanged; nothing to parse.
    NotModified,
    /// A new or updated body was returned.
    Fresh {
        body: String,
        content_type: Option<String>,
        etag: Option<String>,
        last_modified: Option<String>,
        /// `rel="hub"` link advertised for WebSub (C8), if any.
        hub: Option<String>,
        /// `rel="self"` link, used to confirm the canonical feed url.
        self_url: Option<String>,
    },
}

/// Prior conditional-GET state to send back on the next poll (§4.1).
#[derive(Clone, Debug, Default)]
pub struct ConditionalState {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Fetch `url`, sending `prior` conditional-GET validators and bounding the
/// request to `timeout`.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    prior: &ConditionalState,
    timeout: std::time::Duration,
) -> Result<FetchResult, FetchError> {
    let mut request = client
        .get(url)
        .timeout(timeout)
        .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
        .header(reqwest::header::USER_AGENT, USER_AGENT);

    if let Some(etag) = &prior.etag {
        request = request.header(reqwest::header::IF_NONE_MATCH, etag);
    }
    if let Some(last_modified) = &prior.last_modified {
        request = request.header(reqwest::header::IF_MODIFIED_SINCE, last_modified);
    }

    let response = request.send().await.map_err(classify_reqwest_error)?;

    if response.status() == reqwest::StatusCode::NOT_MODIFIED {
        return Ok(FetchResult::NotModified);
    }
    if !response.status().is_success() {
        return Err(FetchError::Http { status: response.status().as_u16() });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let etag = response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let (hub, self_url) = parse_link_header(response.headers());

    let body = response.text().await.map_err(classify_reqwest_error)?;

    Ok(FetchResult::Fresh { body, content_type, etag, last_modified, hub, self_url })
}

/// Outcome of [`follow`]'s one-shot discovery probe.
#[derive(Debug)]
pub enum FollowOutcome {
    /// The probe fetched `url` and recognized its body as `kind`; the body
    /// and conditional-GET validators are included so the caller can parse
    /// it immediately instead of waiting for the next scheduled poll.
    Confirmed {
        kind: crate::feed_kind::FeedKind,
        body: String,
        etag: Option<String>,
        last_modified: Option<String>,
        hub: Option<String>,
        self_url: Option<String>,
    },
    /// Discovery failed -- network error, timeout, or an unrecognized body
    /// -- but `url` was supplied explicitly by the caller, so it is accepted
    /// as a candidate feed URL to subscribe to verbatim (§4.1 "discovery
    /// probes"; SPEC_FULL.md "Feed discovery probe").
    Candidate,
}

/// Probe `url` with [`DISCOVERY_TIMEOUT`] to confirm it is a feed before
/// subscribing to it, falling back to treating `url` itself as a candidate
/// feed when discovery can't confirm a recognized format.
pub async fn follow(client: &reqwest::Client, url: &str) -> FollowOutcome {
    let Ok(FetchResult::Fresh { body, content_type, etag, last_modified, hub, self_url }) =
        fetch(client, url, &ConditionalState::default(), DISCOVERY_TIMEOUT).await
    else {
        return FollowOutcome::Candidate;
    };

    let kind = crate::feed_kind::detect_type(&body, content_type.as_deref());
    if matches!(kind, crate::feed_kind::FeedKind::Unknown) {
        FollowOutcome::Candidate
    } else {
        FollowOutcome::Confirmed { kind, body, etag, last_modified, hub, self_url }
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = err.status() {
        FetchError::Http { status: status.as_u16() }
    } else {
        FetchError::Network(err.to_string())
    }
}

/// Tolerantly parse an RFC 8288 `Link` header for `rel="hub"` and
/// `rel="self"` targets (§4.1, needed by WebSub discovery C8).
fn parse_link_header(headers: &reqwest::header::HeaderMap) -> (Option<String>, Option<String>) {
    let mut hub = None;
    let mut self_url = None;

    for value in headers.get_all(reqwest::header::LINK).iter() {
        let Ok(value) = value.to_str() else { continue };
        for entry in value.split(',') {
            let Some((url_part, rest)) = entry.split_once(';') else { continue };
            let url = url_part.trim().trim_start_matches('<').trim_end_matches('>').to_string();
            let rest = rest.to_ascii_lowercase();
            if rest.contains("rel=\"hub\"") || rest.contains("rel=hub") {
                hub.get_or_insert(url.clone());
            }
            if rest.contains("rel=\"self\"") || rest.contains("rel=self") {
                self_url.get_or_insert(url);
            }
        }
    }

    (hub, self_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hub_and_self_from_link_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::LINK,
            "<https://hub.example.org/>; rel=\"hub\", <https://example.org/feed>; rel=\"self\""
                .parse()
                .unwrap(),
        );
        let (hub, self_url) = parse_link_header(&headers);
        assert_eq!(hub.as_deref(), Some("https://hub.example.org/"));
        assert_eq!(self_url.as_deref(), Some("https://example.org/feed"));
    }

    #[test]
    fn tolerates_missing_link_header() {
        let headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_link_header(&headers), (None, None));
    }

    #[tokio::test]
    async fn follow_falls_back_to_candidate_when_discovery_cannot_reach_the_url() {
        let client = reqwest::Client::new();
        let outcome = follow(&client, "https://example.invalid/feed.xml").await;
        assert!(matches!(outcome, FollowOutcome::Candidate));
    }
}
