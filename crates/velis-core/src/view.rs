// Host-facing thermostat view derived from the cached device state.

use serde::Serialize;
use strum::Display;

use crate::config::{HeaterConfig, TempRange};
use crate::mode::{mode_label, mode_range};
use crate::state::DeviceState;

const MAX_SHOWERS: f64 = 4.0;

/// Heating state as a thermostat host understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum HeatingState {
    Off,
    Heat,
}

/// Readings beyond the thermostat basics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxSensors {
    pub anti_legionella: bool,
    pub heating_active: bool,
    pub showers: u8,
    pub mode: i64,
    pub mode_name: String,
    pub mode_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatView {
    pub name: String,
    pub current_temperature: f64,
    pub target_temperature: f64,
    pub heating_state: HeatingState,
    /// `None` unless auxiliary sensors are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aux: Option<AuxSensors>,
}

impl ThermostatView {
    pub fn new(state: &DeviceState, config: &HeaterConfig) -> Self {
        let range = config.temp_range();
        let aux = config.aux_sensors.then(|| AuxSensors {
            anti_legionella: state.anti_leg.unwrap_or(false),
            heating_active: state.heat_req.unwrap_or(false),
            showers: showers(state.av_shw),
            mode: state.mode.unwrap_or(0),
            mode_name: mode_label(state.mode),
            mode_range: mode_range(state.mode, range).to_string(),
        });

        Self {
            name: config.name.clone(),
            current_temperature: clamp_or_min(state.current_temp, range),
            target_temperature: clamp_or_min(state.target_temp, range),
            heating_state: heating_state(state.power),
            aux,
        }
    }
}

pub fn heating_state(power: Option<bool>) -> HeatingState {
    if power == Some(true) {
        HeatingState::Heat
    } else {
        HeatingState::Off
    }
}

fn clamp_or_min(value: Option<f64>, range: TempRange) -> f64 {
    value.map_or(range.min, |v| range.clamp(v))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn showers(value: Option<f64>) -> u8 {
    value.map_or(0, |v| v.round().clamp(0.0, MAX_SHOWERS) as u8)
}
