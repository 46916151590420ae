//! Config command: resolved values and their sources

use crate::config_loader::{config_path, load_config};
use crate::output::OutputWriter;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled)]
struct ConfigRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Source")]
    source: String,
}

pub fn execute(explicit: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let config = load_config(explicit)?;
    // Surface invalid combinations even when only inspecting
    if let Err(e) = config.resolve() {
        output.warning(e);
    }

    let mut rows: Vec<ConfigRow> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigRow { key, value, source: format!("{:?}", source) })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    if output.is_json() {
        let file = config_path(explicit).map(|p| p.display().to_string());
        output.result(serde_json::json!({ "file": file, "values": rows }))?;
    } else {
        output.section("Configuration");
        match config_path(explicit) {
            Some(path) => output.kv("File", path.display()),
            None => output.kv("File", "(none)"),
        }
        output.table(rows);
    }
    Ok(())
}
