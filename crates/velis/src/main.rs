mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use velis_config::{Config, Profile};
use velis_core::{Heater, HeaterConfig};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(mut cli: Cli) -> Result<(), CliError> {
    let cfg = velis_config::load_config()?;
    if cli.global.output.is_none() {
        cli.global.output = Some(output::parse_format(&cfg.defaults.output)?);
    }

    let mut config = build_heater_config(&cfg, &cli.global)?;
    if let Command::Watch(ref args) = cli.command {
        if let Some(interval) = args.interval {
            config.poll_interval = interval;
        }
    }

    let heater = Heater::new(config)?;
    tracing::debug!(command = ?cli.command, "dispatching command");
    commands::dispatch(cli.command, &heater, &cli.global).await
}

/// Build a `HeaterConfig` from the config file, profile, and CLI overrides.
///
/// A missing default profile is not an error: credentials may come from the
/// environment alone. A profile named with `--profile` must exist.
fn build_heater_config(cfg: &Config, global: &GlobalOpts) -> Result<HeaterConfig, CliError> {
    let profile_name = cfg.profile_name(global.profile.as_deref()).to_owned();

    let fallback = Profile::default();
    let profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile,
        None if global.profile.is_some() => {
            let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
            names.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
                path: velis_config::config_path().display().to_string(),
            });
        }
        None => &fallback,
    };

    let mut config = velis_config::profile_to_heater_config(profile, &profile_name, &cfg.defaults)?;
    if let Some(ref plant) = global.plant {
        if !plant.trim().is_empty() {
            config.plant_id = Some(plant.trim().to_owned());
        }
    }
    Ok(config)
}
