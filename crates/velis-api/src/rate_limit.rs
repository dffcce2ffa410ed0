// Retry-After parsing for HTTP 429 responses.
//
// The header carries either delta-seconds or an HTTP-date. Both forms are
// capped so a misbehaving server cannot park the poller for hours.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Upper bound applied to any parsed `Retry-After` value.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(10 * 60);

/// Extract the `Retry-After` delay from response headers.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after_value(raw, Utc::now())
}

/// Parse a raw `Retry-After` value relative to `now`.
///
/// Dates in the past yield a zero delay. Unparseable values yield `None`.
pub fn parse_retry_after_value(raw: &str, now: DateTime<Utc>) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let delay = if let Ok(secs) = raw.parse::<u64>() {
        Duration::from_secs(secs)
    } else {
        let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
        (at - now).to_std().unwrap_or(Duration::ZERO)
    };

    Some(delay.min(MAX_RETRY_AFTER))
}
