//! Command dispatch: bridges CLI args -> heater operations -> output formatting.

pub mod plants;
pub mod probe;
pub mod status;
pub mod watch;

use velis_core::Heater;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(cmd: Command, heater: &Heater, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Probe => probe::handle(heater, global).await,
        Command::Plants => plants::handle(heater, global).await,
        Command::Status => status::show(heater, global).await,
        Command::SetTemp { value } => status::set_temperature(heater, value, global).await,
        Command::Power { state } => status::set_power(heater, state.is_on(), global).await,
        Command::Watch(_) => watch::handle(heater, global).await,
    }
}
