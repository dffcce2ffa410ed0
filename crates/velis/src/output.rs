//! Output formatting: table and JSON.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde.

use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use velis_core::{HeatingState, ThermostatView};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Parse the `defaults.output` config value.
pub fn parse_format(configured: &str) -> Result<OutputFormat, CliError> {
    OutputFormat::from_str(configured.trim(), true).map_err(|_| CliError::Validation {
        field: "defaults.output".into(),
        reason: format!("expected table, json or json-compact, got '{configured}'"),
    })
}

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint_heating(state: HeatingState, color: bool) -> String {
    let label = state.to_string();
    if !color {
        return label;
    }
    match state {
        HeatingState::Heat => label.red().bold().to_string(),
        HeatingState::Off => label.dimmed().to_string(),
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

/// A two-column detail row.
#[derive(Tabled)]
pub struct KvRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl KvRow {
    pub fn new(field: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

fn fmt_temp(value: f64) -> String {
    format!("{value:.1}°C")
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Detail rows for a thermostat view.
pub fn view_rows(view: &ThermostatView, color: bool) -> Vec<KvRow> {
    let mut rows = vec![
        KvRow::new("Name", &view.name),
        KvRow::new("Current", fmt_temp(view.current_temperature)),
        KvRow::new("Target", fmt_temp(view.target_temperature)),
        KvRow::new("Heating", paint_heating(view.heating_state, color)),
    ];
    if let Some(ref aux) = view.aux {
        rows.push(KvRow::new("Mode", format!("{} ({})", aux.mode_name, aux.mode_range)));
        rows.push(KvRow::new("Showers", aux.showers));
        rows.push(KvRow::new("Heating active", yes_no(aux.heating_active)));
        rows.push(KvRow::new("Anti-legionella", yes_no(aux.anti_legionella)));
    }
    rows
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering goes through `detail_fn`, which returns key/value rows.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> Vec<KvRow>,
) -> Result<String, CliError>
where
    T: Serialize,
{
    match format {
        OutputFormat::Table => Ok(render_table(&detail_fn(data))),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(rendered)
}
