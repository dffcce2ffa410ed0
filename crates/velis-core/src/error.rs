// ── Core error types ──
//
// Domain errors from velis-core. Consumers never see HTTP status codes or
// JSON parse failures directly: the `From<velis_api::Error>` impl folds
// transport-layer errors into the taxonomy the reconciler reasons about.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session ──────────────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Resolution ───────────────────────────────────────────────────
    #[error("No usable data from any variant for plant {plant_id}")]
    NoData { plant_id: String },

    #[error("No water heaters found on this account")]
    NoDevices,

    #[error("Rate limited{}", retry_after_suffix(*.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transport error: {message}")]
    Transport { message: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Device not ready yet -- try again in a moment")]
    NotReady,

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn retry_after_suffix(retry_after: Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| {
        format!(" -- retry after {}s", d.as_secs())
    })
}

impl CoreError {
    /// The server-signaled retry delay, if this is a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<velis_api::Error> for CoreError {
    fn from(err: velis_api::Error) -> Self {
        match err {
            velis_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            velis_api::Error::NotAuthenticated | velis_api::Error::SessionExpired => {
                CoreError::SessionExpired
            }
            velis_api::Error::Transport(e) => CoreError::Transport {
                message: e.to_string(),
            },
            velis_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            velis_api::Error::RateLimited { retry_after } => CoreError::RateLimited { retry_after },
            velis_api::Error::Status { operation, status } => CoreError::Api {
                message: format!("{operation} failed"),
                status: Some(status),
            },
        }
    }
}
