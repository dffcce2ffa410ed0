//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use velis_config::ConfigError;
use velis_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const RATE_LIMITED: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(velis::auth_failed),
        help(
            "Verify the account e-mail and password.\n\
             Set VELIS_PASSWORD, store it in the keyring under '<profile>/password',\n\
             or add `password` to the profile in {path}"
        )
    )]
    AuthFailed { message: String, path: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(velis::no_credentials),
        help(
            "Add `username` to the profile in {path},\n\
             or set VELIS_USERNAME and VELIS_PASSWORD."
        )
    )]
    NoCredentials { profile: String, path: String },

    // ── Device ───────────────────────────────────────────────────────
    #[error("No water heaters found on this account")]
    #[diagnostic(
        code(velis::no_devices),
        help("Run: velis plants -vv to see what the account returns")
    )]
    NoDevices,

    #[error("No usable data from any API variant for '{plant_id}'")]
    #[diagnostic(
        code(velis::no_data),
        help(
            "Check the device identifier with: velis plants\n\
             Run: velis probe -vv to see every variant's answer"
        )
    )]
    NoData { plant_id: String },

    #[error("Device not ready")]
    #[diagnostic(
        code(velis::not_ready),
        help("The device could not be initialized. Re-run with -v for details.")
    )]
    NotReady,

    // ── Remote ───────────────────────────────────────────────────────
    #[error("Rate limited by the remote service{}", retry_hint(*.retry_after))]
    #[diagnostic(
        code(velis::rate_limited),
        help("Wait before retrying, or raise `poll_interval` in your profile.")
    )]
    RateLimited { retry_after: Option<Duration> },

    #[error("Could not reach the remote service: {message}")]
    #[diagnostic(
        code(velis::connection_failed),
        help("Check network connectivity, or `base_url` if you overrode it.")
    )]
    Connection { message: String },

    #[error("API error{}: {message}", status_suffix(*.status))]
    #[diagnostic(code(velis::api_error))]
    Api { message: String, status: Option<u16> },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(velis::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(velis::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Profiles live in {path}"
        )
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(velis::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not serialize output: {0}")]
    #[diagnostic(code(velis::json))]
    Json(#[from] serde_json::Error),
}

fn retry_hint(retry_after: Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| {
        format!(" (retry in {})", humantime::format_duration(d))
    })
}

fn status_suffix(status: Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NoDevices | Self::NoData { .. } | Self::ProfileNotFound { .. } => {
                exit_code::NOT_FOUND
            }
            Self::RateLimited { .. } => exit_code::RATE_LIMITED,
            Self::Connection { .. } => exit_code::CONNECTION,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

fn config_path_display() -> String {
    velis_config::config_path().display().to_string()
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                message,
                path: config_path_display(),
            },

            CoreError::SessionExpired => CliError::AuthFailed {
                message: "the session was rejected".into(),
                path: config_path_display(),
            },

            CoreError::NoData { plant_id } => CliError::NoData { plant_id },
            CoreError::NoDevices => CliError::NoDevices,
            CoreError::NotReady => CliError::NotReady,
            CoreError::RateLimited { retry_after } => CliError::RateLimited { retry_after },
            CoreError::Transport { message } => CliError::Connection { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Api { message, status } => CliError::Api { message, status },

            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials {
                profile,
                path: config_path_display(),
            },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
                path: config_path_display(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
