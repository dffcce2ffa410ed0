//! Long-running poll loop.

use tracing::{debug, info};

use velis_core::Heater;

use crate::cli::GlobalOpts;
use crate::error::CliError;

use super::status::print_view;

/// Start the supervisor and print the view on every state change until Ctrl-C.
pub async fn handle(heater: &Heater, global: &GlobalOpts) -> Result<(), CliError> {
    let mut updates = heater.subscribe();
    heater.start().await;
    info!(
        interval = %humantime::format_duration(heater.config().poll_interval),
        "watching heater"
    );

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                debug!("interrupt received");
                break signal.map_err(CliError::from);
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                if let Err(err) = print_view(heater, global) {
                    break Err(err);
                }
            }
        }
    };

    heater.shutdown().await;
    result
}
