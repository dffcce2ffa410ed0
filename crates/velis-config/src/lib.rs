//! Shared configuration for the Velis tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `velis_core::HeaterConfig`. The CLI adds
//! `GlobalOpts`-aware overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use velis_core::{Credentials, HeaterConfig};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "velis";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named heater profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// The profile name to use: explicit choice, then `default_profile`,
    /// then `"default"`.
    pub fn profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll interval in seconds. 0 disables polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    15
}
fn default_poll_interval() -> u64 {
    30 * 60
}

/// A named water-heater profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Display name.
    pub name: Option<String>,

    /// Account username (e-mail).
    pub username: Option<String>,

    /// Account password (plaintext -- prefer keyring or `VELIS_PASSWORD`).
    pub password: Option<String>,

    /// Device identifier. Omit to use the first device on the account.
    pub plant_id: Option<String>,

    /// Override the API root.
    pub base_url: Option<String>,

    /// Override the HTTP user agent.
    pub user_agent: Option<String>,

    /// Poll interval in seconds (0 disables polling).
    pub poll_interval: Option<u64>,

    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,

    /// Refresh in the background when a value is read.
    pub refresh_on_get: Option<bool>,

    /// Minimum seconds between on-demand refreshes.
    pub refresh_cooldown: Option<u64>,

    /// Expose anti-legionella, heating, showers and mode readings.
    pub aux_sensors: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Directory for the variant cache file.
    pub cache_dir: Option<PathBuf>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "velis", "velis")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for the variant cache.
pub fn cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

fn dirs_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("velis");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment.
///
/// Environment keys use `__` for nesting, e.g.
/// `VELIS_PROFILES__HOME__PLANT_ID`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VELIS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve account credentials for a profile.
///
/// Username: profile, then `VELIS_USERNAME`. Password: `VELIS_PASSWORD`,
/// then the system keyring (`velis` / `<profile>/password`), then the
/// plaintext profile value.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("VELIS_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let password = resolve_password(profile, profile_name).ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })?;

    Ok(Credentials { username, password })
}

fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Env var
    if let Ok(pw) = std::env::var("VELIS_PASSWORD") {
        return Some(SecretString::from(pw));
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Some(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    profile.password.clone().map(SecretString::from)
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `HeaterConfig` from a profile and the global defaults.
///
/// Range floors (minimum temperature, cooldown, poll interval) are applied
/// later by `HeaterConfig::normalized()`; this only rejects values that
/// cannot be meaningful at all.
pub fn profile_to_heater_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<HeaterConfig, ConfigError> {
    let credentials = resolve_credentials(profile, profile_name)?;
    let mut config = HeaterConfig::new(credentials);

    if let Some(ref name) = profile.name {
        config.name.clone_from(name);
    }
    if let Some(ref base_url) = profile.base_url {
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::Validation {
                field: "base_url".into(),
                reason: format!("expected an http(s) URL, got '{base_url}'"),
            });
        }
        config.base_url.clone_from(base_url);
    }
    if let Some(ref user_agent) = profile.user_agent {
        config.user_agent.clone_from(user_agent);
    }
    config.plant_id = profile.plant_id.clone().filter(|id| !id.trim().is_empty());

    config.poll_interval =
        Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval));
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(cooldown) = profile.refresh_cooldown {
        config.refresh_cooldown = Duration::from_secs(cooldown);
    }

    if let Some(min) = profile.min_temp {
        config.min_temp = finite("min_temp", min)?;
    }
    if let Some(max) = profile.max_temp {
        config.max_temp = finite("max_temp", max)?;
    }
    if let Some(flag) = profile.refresh_on_get {
        config.refresh_on_get = flag;
    }
    if let Some(flag) = profile.aux_sensors {
        config.aux_sensors = flag;
    }
    config.cache_dir = profile.cache_dir.clone().unwrap_or_else(cache_dir);

    Ok(config.normalized())
}

fn finite(field: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("expected a number, got {value}"),
        })
    }
}
