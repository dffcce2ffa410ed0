use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `velis-api` crate.
///
/// Covers every failure mode of a single HTTP exchange with the remote
/// API. `velis-core` aggregates these across variant probes and maps the
/// survivors into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, missing token in the response, ...).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A device call was attempted before any successful login.
    #[error("Not logged in -- call login() first")]
    NotAuthenticated,

    /// The API rejected the session token (HTTP 401/403).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Throttling ──────────────────────────────────────────────────
    /// HTTP 429. Carries the parsed `Retry-After` delay when the server sent one.
    #[error("Rate limited{}", retry_after_suffix(*.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    // ── API ─────────────────────────────────────────────────────────
    /// Unexpected HTTP status on a call that requires success.
    #[error("{operation} failed (HTTP {status})")]
    Status { operation: String, status: u16 },
}

fn retry_after_suffix(retry_after: Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| {
        format!(" -- retry after {}s", d.as_secs())
    })
}

impl Error {
    /// Returns `true` if this error indicates the session token is no
    /// longer accepted and a fresh login might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::NotAuthenticated)
    }

    /// The server-signaled retry delay, if this is a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
