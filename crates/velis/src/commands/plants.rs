//! Device listing.

use serde_json::Value;
use tabled::Tabled;

use velis_core::{Heater, plant_identifier};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PlantRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
}

fn text(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
}

impl From<&Value> for PlantRow {
    fn from(record: &Value) -> Self {
        Self {
            id: plant_identifier(record).unwrap_or_else(|| "-".into()),
            name: text(record, &["name", "plantName"]).unwrap_or_default(),
        }
    }
}

pub async fn handle(heater: &Heater, global: &GlobalOpts) -> Result<(), CliError> {
    let plants = heater.list_plants().await?;
    let out = output::render_list(global.output_format(), &plants, |v| PlantRow::from(v))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
