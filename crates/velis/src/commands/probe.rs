//! Variant diagnostics.

use serde::Serialize;
use serde_json::{Map, Value};

use velis_core::{Heater, NormalizedFields, Variant};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, KvRow};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeReport {
    plant: String,
    variant: Variant,
    score: u8,
    fields: NormalizedFields,
    raw: Map<String, Value>,
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn detail(report: &ProbeReport) -> Vec<KvRow> {
    let f = &report.fields;
    vec![
        KvRow::new("Plant", &report.plant),
        KvRow::new("Variant", report.variant),
        KvRow::new("Score", report.score),
        KvRow::new("Current temp", opt(f.current_temp)),
        KvRow::new("Target temp", opt(f.target_temp)),
        KvRow::new("Power", opt(f.power_state)),
        KvRow::new("Anti-legionella", opt(f.anti_leg)),
        KvRow::new("Heat request", opt(f.heat_req)),
        KvRow::new("Showers", opt(f.av_shw)),
        KvRow::new("Mode", opt(f.mode)),
        KvRow::new("Raw keys", report.raw.len()),
    ]
}

pub async fn handle(heater: &Heater, global: &GlobalOpts) -> Result<(), CliError> {
    let (plant, resolution) = heater.probe().await?;
    let report = ProbeReport {
        plant,
        variant: resolution.variant,
        score: resolution.score,
        fields: resolution.fields,
        raw: resolution.raw,
    };
    let out = output::render_single(global.output_format(), &report, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
