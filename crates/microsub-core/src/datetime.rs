//! Best-effort `DateTime` handling, generalized for parsing feeds and for
//! conversion to/from `chrono`.

use super::*;

/// Datetime generalization used throughout the engine.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct DateTime(chrono::DateTime<chrono::Utc>);

impl DateTime {
    /// Get the current time.
    pub fn now() -> Self {
        DateTime(chrono::Utc::now())
    }

    /// The unix epoch.
    pub fn epoch() -> Self {
        DateTime(chrono::DateTime::UNIX_EPOCH)
    }

    /// Convert to `chrono::DateTime<Utc>`.
    pub fn to_chrono(&self) -> chrono::DateTime<chrono::Utc> {
        self.0
    }

    /// Build from a `chrono::DateTime<Utc>`.
    pub fn from_chrono(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// ISO-8601 (RFC 3339) representation, full precision.
    pub fn to_iso8601(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    /// Parse an RFC 3339 string produced by [`DateTime::to_iso8601`].
    pub fn from_iso8601(s: &str) -> Option<Self> {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.to_utc()))
    }

    /// Best-effort parse of a feed-supplied date: RFC 3339, RFC 2822, and
    /// the `YYYY-MM-DD HH:MM[:SS]` family with an implied UTC offset (§4.2).
    pub fn parse_feed_date(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(value) {
            return Some(DateTime(parsed.to_utc()));
        }
        if let Ok(parsed) = chrono::DateTime::parse_from_rfc2822(value) {
            return Some(DateTime(parsed.to_utc()));
        }

        for fmt in [
            "%Y-%m-%dT%H:%M:%SZ",
            "%Y-%m-%dT%H:%MZ",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, fmt)
            {
                return Some(DateTime(chrono::DateTime::from_naive_utc_and_offset(
                    naive,
                    chrono::Utc,
                )));
            }
        }

        if let Ok(date) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Some(DateTime(chrono::DateTime::from_naive_utc_and_offset(
                    naive,
                    chrono::Utc,
                )));
            }
        }

        None
    }

    /// Format following the `If-Modified-Since` / `Last-Modified` header grammar.
    pub fn to_http_date(&self) -> String {
        // `chrono`'s `%a, %d %b %Y %H:%M:%S GMT` matches RFC 7231's IMF-fixdate.
        self.0.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }
}

impl std::fmt::Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl std::ops::Add<Duration> for DateTime {
    type Output = DateTime;
    fn add(self, rhs: Duration) -> Self::Output {
        DateTime(self.0 + rhs.0)
    }
}

impl std::ops::Sub<Duration> for DateTime {
    type Output = DateTime;
    fn sub(self, rhs: Duration) -> Self::Output {
        DateTime(self.0 - rhs.0)
    }
}

impl std::ops::Sub<DateTime> for DateTime {
    type Output = Duration;
    fn sub(self, rhs: DateTime) -> Self::Output {
        Duration(self.0 - rhs.0)
    }
}

/// Duration generalization, mirroring [`DateTime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(chrono::Duration);

impl Duration {
    pub fn zero() -> Self {
        Self(chrono::Duration::zero())
    }

    pub fn from_seconds(sec: i64) -> Self {
        Self(chrono::Duration::seconds(sec))
    }

    pub fn from_minutes(min: i64) -> Self {
        Self(chrono::Duration::minutes(min))
    }

    pub fn from_days(days: i64) -> Self {
        Self(chrono::Duration::days(days))
    }

    pub fn to_chrono(&self) -> chrono::Duration {
        self.0
    }

    pub fn to_std(&self) -> std::time::Duration {
        self.0.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
