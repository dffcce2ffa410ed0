// ── Device state ──
//
// Last-known readings for one water heater. Refresh results merge in
// field by field: a reading that is absent, mistyped, or a known
// placeholder never overwrites a good cached value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use velis_api::NormalizedFields;

use crate::config::TempRange;

/// Hard plausibility bounds for any temperature reading.
const PLAUSIBLE_MIN: f64 = 0.0;
const PLAUSIBLE_MAX: f64 = 65.0;
/// Placeholder readings the API emits in some device states.
const SENTINELS: [f64; 2] = [0.0, 33.0];
/// How far outside the configured range a sentinel must lie to be dropped.
const SENTINEL_MARGIN: f64 = 5.0;

/// Cached readings plus refresh bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub current_temp: Option<f64>,
    pub target_temp: Option<f64>,
    pub power: Option<bool>,
    pub anti_leg: Option<bool>,
    pub heat_req: Option<bool>,
    pub av_shw: Option<f64>,
    pub mode: Option<i64>,
    /// Wall-clock time of the last successful refresh.
    pub last_refresh: Option<DateTime<Utc>>,
}

/// What a merge dropped or changed, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MergeReport {
    pub discarded_current: Option<f64>,
    pub discarded_target: Option<f64>,
    /// `(previous, new)` when the mode code changed.
    pub mode_change: Option<(Option<i64>, i64)>,
}

/// Returns the reading if plausible, `None` if it should be ignored.
#[allow(clippy::float_cmp)]
pub fn validate_temperature(value: f64, configured: TempRange) -> Option<f64> {
    if !value.is_finite() || !(PLAUSIBLE_MIN..=PLAUSIBLE_MAX).contains(&value) {
        return None;
    }
    let far_outside = value < configured.min - SENTINEL_MARGIN || value > configured.max + SENTINEL_MARGIN;
    if far_outside && SENTINELS.iter().any(|s| *s == value) {
        return None;
    }
    Some(value)
}

impl DeviceState {
    /// Merge freshly extracted fields. Each present, valid field
    /// overwrites its cached counterpart; everything else is kept.
    pub fn merge(&mut self, fields: &NormalizedFields, configured: TempRange) -> MergeReport {
        let mut report = MergeReport::default();

        if let Some(raw) = fields.current_temp {
            match validate_temperature(raw, configured) {
                Some(t) => self.current_temp = Some(t),
                None => report.discarded_current = Some(raw),
            }
        }
        if let Some(raw) = fields.target_temp {
            match validate_temperature(raw, configured) {
                Some(t) => self.target_temp = Some(t),
                None => report.discarded_target = Some(raw),
            }
        }
        if let Some(on) = fields.power_state {
            self.power = Some(on);
        }
        if let Some(flag) = fields.anti_leg {
            self.anti_leg = Some(flag);
        }
        if let Some(flag) = fields.heat_req {
            self.heat_req = Some(flag);
        }
        if let Some(showers) = fields.av_shw {
            self.av_shw = Some(showers);
        }
        if let Some(mode) = fields.mode {
            if self.mode != Some(mode) {
                report.mode_change = Some((self.mode, mode));
            }
            self.mode = Some(mode);
        }

        report
    }
}
