// ── Runtime heater configuration ──
//
// These types describe *how* to reach one water heater and how the
// reconciler paces itself. They carry credential data and tuning, but
// never touch disk. The CLI constructs a `HeaterConfig` and hands it in.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use velis_api::{Credentials, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

use crate::session::LoginRetryPolicy;

/// Default poll period between scheduled refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Shortest accepted poll period. Zero still means "never poll".
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Default minimum spacing between on-demand refreshes.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(10);
/// Shortest accepted on-demand refresh spacing.
pub const MIN_REFRESH_COOLDOWN: Duration = Duration::from_secs(2);

/// An inclusive temperature range in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempRange {
    pub min: f64,
    pub max: f64,
}

impl TempRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp into the range.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

impl fmt::Display for TempRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}°C", self.min, self.max)
    }
}

/// Configuration for one water heater.
///
/// Built by the CLI, passed to `Heater` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct HeaterConfig {
    /// Display name used in logs and the thermostat view.
    pub name: String,
    /// API root, e.g. `https://www.ariston-net.remotethermo.com/api/v2/`.
    pub base_url: String,
    pub user_agent: String,
    pub credentials: Credentials,
    /// Device identifier. `None` discovers the first device on the account.
    pub plant_id: Option<String>,
    /// Scheduled refresh period. Zero disables polling.
    pub poll_interval: Duration,
    /// Delay before the first scheduled refresh once ready.
    pub initial_refresh_delay: Duration,
    pub min_temp: f64,
    pub max_temp: f64,
    /// Trigger a background refresh when a value is read.
    pub refresh_on_get: bool,
    pub refresh_cooldown: Duration,
    /// Expose anti-legionella, heating-active, showers and mode readings.
    pub aux_sensors: bool,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Directory holding the variant cache file.
    pub cache_dir: PathBuf,
    /// Wait between failed initialization attempts under `Heater::start`.
    pub init_retry_delay: Duration,
    pub login_retry: LoginRetryPolicy,
}

impl HeaterConfig {
    /// A config with every tuning knob at its default.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            name: "Velis Water Heater".into(),
            base_url: DEFAULT_BASE_URL.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            credentials,
            plant_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_refresh_delay: Duration::from_secs(2),
            min_temp: 35.0,
            max_temp: 70.0,
            refresh_on_get: true,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            aux_sensors: true,
            timeout: Duration::from_secs(15),
            cache_dir: PathBuf::from("."),
            init_retry_delay: Duration::from_secs(60),
            login_retry: LoginRetryPolicy::default(),
        }
    }

    /// Apply the accepted-value floors.
    ///
    /// - `min_temp` is at least 1
    /// - `max_temp` is at least `min_temp + 1`
    /// - `refresh_cooldown` is at least [`MIN_REFRESH_COOLDOWN`]
    /// - a non-zero `poll_interval` is at least [`MIN_POLL_INTERVAL`]
    /// - non-finite temperatures fall back to the defaults
    pub fn normalized(mut self) -> Self {
        if !self.min_temp.is_finite() {
            self.min_temp = 35.0;
        }
        if !self.max_temp.is_finite() {
            self.max_temp = 70.0;
        }
        self.min_temp = self.min_temp.max(1.0);
        self.max_temp = self.max_temp.max(self.min_temp + 1.0);
        self.refresh_cooldown = self.refresh_cooldown.max(MIN_REFRESH_COOLDOWN);
        if !self.poll_interval.is_zero() {
            self.poll_interval = self.poll_interval.max(MIN_POLL_INTERVAL);
        }
        self
    }

    /// The configured target-temperature range.
    pub fn temp_range(&self) -> TempRange {
        TempRange::new(self.min_temp, self.max_temp)
    }

    /// Location of the persisted variant cache.
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(crate::cache::CACHE_FILE_NAME)
    }
}
