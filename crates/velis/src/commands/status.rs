//! Status and command handlers for a single heater.

use velis_core::Heater;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn show(heater: &Heater, global: &GlobalOpts) -> Result<(), CliError> {
    heater.initialize().await?;
    print_view(heater, global)
}

pub async fn set_temperature(
    heater: &Heater,
    value: f64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    heater.initialize().await?;
    let applied = heater.set_temperature(value).await?;
    if !global.quiet {
        eprintln!("Target temperature set to {applied:.0}°C");
    }
    print_view(heater, global)
}

pub async fn set_power(heater: &Heater, on: bool, global: &GlobalOpts) -> Result<(), CliError> {
    heater.initialize().await?;
    heater.set_power(on).await?;
    if !global.quiet {
        eprintln!("Heater switched {}", if on { "on" } else { "off" });
    }
    print_view(heater, global)
}

pub(crate) fn print_view(heater: &Heater, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let view = heater.view();
    let out = output::render_single(global.output_format(), &view, |v| output::view_rows(v, color))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
