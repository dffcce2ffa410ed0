//! Clap derive structures for the `velis` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// velis -- bridge and diagnostics for Ariston Velis water heaters
#[derive(Debug, Parser)]
#[command(
    name = "velis",
    version,
    about = "Monitor and control Ariston Velis water heaters",
    long_about = "Talks to the Ariston NET remote-thermo cloud API.\n\n\
        Discovers which API variant a heater answers on, keeps a cached view\n\
        of its state, and issues temperature and power commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Heater profile to use
    #[arg(long, short = 'p', env = "VELIS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device identifier (overrides profile; omit to auto-discover)
    #[arg(long, env = "VELIS_PLANT", global = true)]
    pub plant: Option<String>,

    /// Output format [default: `defaults.output` from the config file, else table]
    #[arg(long, short = 'o', env = "VELIS_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

impl GlobalOpts {
    /// The output format in effect; table when neither flag nor config chose one.
    pub fn output_format(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan every API variant and show which one answers, with its score
    Probe,

    /// List the water heaters on the account
    #[command(alias = "ls")]
    Plants,

    /// Show the current thermostat view
    #[command(alias = "st")]
    Status,

    /// Set the target temperature (rounded, clamped to the configured range)
    SetTemp {
        /// Target temperature in °C
        value: f64,
    },

    /// Switch the heater on or off
    Power {
        #[arg(value_enum)]
        state: PowerState,
    },

    /// Keep polling and print every state change until Ctrl-C
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval (e.g. "5m", "30s"); overrides the profile
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<std::time::Duration>,
}
