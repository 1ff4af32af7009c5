use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{Value, json};

use super::config_str;
use crate::context::{Config, ProcessingContext};
use crate::engine::Node;

const DEFAULT_BACKUP_DIR: &str = "./backup";

/// Count the lines of a file matching the regex in config `pattern`
pub fn match_lines(
    node: &Node,
    _ctx: &mut ProcessingContext,
    config: &Config,
) -> Result<Option<Value>> {
    if !node.is_file() {
        return Ok(None);
    }

    let pattern =
        config_str(config, "pattern").context("match_lines needs a 'pattern' config value")?;
    let regex = Regex::new(pattern).with_context(|| format!("Invalid regex '{pattern}'"))?;

    let bytes = fs::read(&node.path)
        .with_context(|| format!("Failed to read {}", node.path.display()))?;
    let matches = String::from_utf8_lossy(&bytes)
        .lines()
        .filter(|line| regex.is_match(line))
        .count();

    Ok(Some(json!({ "path": node.key(), "matches": matches })))
}

/// Copy a file to `backup_dir/<relative path>`
pub fn backup_file(
    node: &Node,
    _ctx: &mut ProcessingContext,
    config: &Config,
) -> Result<Option<Value>> {
    if !node.is_file() {
        return Ok(None);
    }

    let backup_root = PathBuf::from(config_str(config, "backup_dir").unwrap_or(DEFAULT_BACKUP_DIR));
    let target = backup_root.join(&node.rel_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(&node.path, &target).with_context(|| {
        format!("Failed to copy {} to {}", node.path.display(), target.display())
    })?;

    Ok(Some(json!({
        "action": "backup",
        "from": node.path.display().to_string(),
        "to": target.display().to_string(),
    })))
}
