// Normalized field extraction.
//
// Every variant names the same logical readings differently. Instead of a
// mapping table per variant, each logical field carries an ordered alias
// list and the first present, non-null key wins. Supporting a new device
// family means adding aliases here, nothing else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A logical reading exposed by the water heater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CurrentTemp,
    TargetTemp,
    PowerState,
    AntiLegionella,
    HeatRequest,
    AvailableShowers,
    Mode,
}

impl Field {
    /// Raw key names to try, highest priority first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::CurrentTemp => &["temp", "wtrTemp", "currentTemp", "currTemp", "tCur"],
            Self::TargetTemp => &["procReqTemp", "reqTemp", "targetTemp", "tSet"],
            Self::PowerState => &["on", "power", "pwr"],
            Self::AntiLegionella => &["antiLeg", "antiLegionella", "antiLegionellaActive"],
            Self::HeatRequest => &["heatReq", "heatingReq", "heatingRequest"],
            Self::AvailableShowers => &["avShw", "availableShowers", "avShow"],
            Self::Mode => &["mode", "opMode", "wtrMode"],
        }
    }
}

/// Return the value of the first key in `aliases` that is present in `map`
/// and not `null`.
///
/// The value is returned as-is; type checking is left to the caller so a
/// present-but-mistyped key still shadows later aliases.
pub fn first_present<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
}

/// The readings extracted from one response body.
///
/// Every field is optional: any variant may omit any reading, and a value
/// of the wrong JSON type is treated as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFields {
    pub current_temp: Option<f64>,
    pub target_temp: Option<f64>,
    pub power_state: Option<bool>,
    pub anti_leg: Option<bool>,
    pub heat_req: Option<bool>,
    pub av_shw: Option<f64>,
    pub mode: Option<i64>,
}

impl NormalizedFields {
    /// Extract all logical fields from a raw JSON object.
    pub fn extract(raw: &Map<String, Value>) -> Self {
        let number = |field: Field| {
            first_present(raw, field.aliases())
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
        };
        let flag = |field: Field| first_present(raw, field.aliases()).and_then(Value::as_bool);

        Self {
            current_temp: number(Field::CurrentTemp),
            target_temp: number(Field::TargetTemp),
            power_state: flag(Field::PowerState),
            anti_leg: flag(Field::AntiLegionella),
            heat_req: flag(Field::HeatRequest),
            av_shw: number(Field::AvailableShowers),
            mode: first_present(raw, Field::Mode.aliases()).and_then(mode_code),
        }
    }
}

/// Mode codes are accepted as integers or as whole-valued floats.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions, clippy::float_cmp)]
fn mode_code(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15)
            .map(|v| v as i64)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(v: &Value) -> &Map<String, Value> {
        v.as_object().expect("test fixture must be an object")
    }

    #[test]
    fn first_alias_wins() {
        let raw = json!({ "currentTemp": 41, "temp": 44 });
        let value = first_present(object(&raw), Field::CurrentTemp.aliases());
        assert_eq!(value, Some(&json!(44)));
    }

    #[test]
    fn null_values_fall_through_to_later_aliases() {
        let raw = json!({ "procReqTemp": null, "reqTemp": 55 });
        let fields = NormalizedFields::extract(object(&raw));
        assert_eq!(fields.target_temp, Some(55.0));
    }

    #[test]
    fn mistyped_value_shadows_later_aliases() {
        let raw = json!({ "on": "yes", "power": true });
        let fields = NormalizedFields::extract(object(&raw));
        assert_eq!(fields.power_state, None);
    }

    #[test]
    fn renamed_keys_across_variants_normalize_identically() {
        let se = json!({ "temp": 45, "procReqTemp": 50, "on": true, "antiLeg": false });
        let med = json!({ "wtrTemp": 45, "reqTemp": 50, "power": true, "antiLegionella": false });
        assert_eq!(
            NormalizedFields::extract(object(&se)),
            NormalizedFields::extract(object(&med))
        );
    }

    #[test]
    fn auxiliary_fields() {
        let raw = json!({ "heatReq": true, "avShw": 2.6, "mode": 7 });
        let fields = NormalizedFields::extract(object(&raw));
        assert_eq!(fields.heat_req, Some(true));
        assert_eq!(fields.av_shw, Some(2.6));
        assert_eq!(fields.mode, Some(7));
        assert_eq!(fields.current_temp, None);
    }

    #[test]
    fn whole_float_mode_is_accepted() {
        let raw = json!({ "opMode": 7.0 });
        assert_eq!(NormalizedFields::extract(object(&raw)).mode, Some(7));

        let fractional = json!({ "mode": 2.5 });
        assert_eq!(NormalizedFields::extract(object(&fractional)).mode, None);
    }
}
