use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::{Value, json};

use super::config_str;
use crate::context::{Config, ProcessingContext};
use crate::engine::Node;

const HISTORY_FILE: &str = "processed_history.jsonl";
const DEFAULT_LOG_DIR: &str = "debug_logs";

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Append `{time, processor, path, type, note}` to `shared["executed"][key]`
pub fn record_to_shared(
    node: &Node,
    ctx: &mut ProcessingContext,
    config: &Config,
) -> Result<Option<Value>> {
    let entry = json!({
        "time": timestamp(),
        "processor": "record_to_shared",
        "path": node.path.display().to_string(),
        "type": if node.is_dir() { "dir" } else { "file" },
        "note": config.get("note").cloned().unwrap_or(Value::Null),
    });

    let slot = ctx.shared_or_insert(&["executed", node.key()], json!([]))?;
    let list = slot
        .as_array_mut()
        .with_context(|| format!("shared executed/{} is not a list", node.key()))?;
    list.push(entry);

    Ok(Some(json!({ "recorded": true })))
}

/// Append the newest result record as one JSON line to
/// `log_dir/processed_history.jsonl`
pub fn persist_history(
    node: &Node,
    ctx: &mut ProcessingContext,
    config: &Config,
) -> Result<Option<Value>> {
    let record = match ctx.results().last() {
        Some(last) if last.processor.is_some() => serde_json::to_value(last)?,
        _ => json!({
            "time": timestamp(),
            "path": node.path.display().to_string(),
            "note": "no_result_available",
        }),
    };

    let dir = PathBuf::from(config_str(config, "log_dir").unwrap_or(DEFAULT_LOG_DIR));
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let file = dir.join(HISTORY_FILE);
    let mut handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    writeln!(handle, "{}", serde_json::to_string(&record)?)?;

    Ok(Some(json!({
        "persisted": true,
        "file": file.display().to_string(),
    })))
}
