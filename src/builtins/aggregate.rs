use std::fs;

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use super::{add_numbers, bucket_namespace};
use crate::context::{Config, ProcessingContext, Status};
use crate::engine::Node;

/// Count the characters of a file and add `{count: 1, chars: N}` into the
/// bucket of its directory
pub fn count_chars(
    node: &Node,
    ctx: &mut ProcessingContext,
    config: &Config,
) -> Result<Option<Value>> {
    let Some(parent) = node.parent_key() else {
        return Ok(None);
    };
    if !node.is_file() {
        return Ok(None);
    }

    let bytes = fs::read(&node.path)
        .with_context(|| format!("Failed to read {}", node.path.display()))?;
    let chars = String::from_utf8_lossy(&bytes).chars().count();

    let mut delta = Map::new();
    delta.insert("count".to_string(), json!(1));
    delta.insert("chars".to_string(), json!(chars));

    let ns = bucket_namespace(config);
    let slot = ctx.bucket_or_insert(&[ns, parent], json!({}))?;
    let target = slot
        .as_object_mut()
        .with_context(|| format!("bucket {ns}/{parent} is not a mapping"))?;
    add_numbers(target, &delta);

    Ok(Some(json!({ "path": node.key(), "chars": chars })))
}

/// Report a directory's bucket as `{path, count, chars}`, zeros when unset
pub fn summarize(
    node: &Node,
    ctx: &mut ProcessingContext,
    config: &Config,
) -> Result<Option<Value>> {
    if !node.is_dir() {
        return Ok(None);
    }

    let mut summary = Map::new();
    summary.insert("path".to_string(), json!(node.key()));
    summary.insert("count".to_string(), json!(0));
    summary.insert("chars".to_string(), json!(0));

    let ns = bucket_namespace(config);
    if let Some(Value::Object(bucket)) = ctx.bucket(&[ns, node.key()]) {
        for (key, value) in bucket {
            summary.insert(key.clone(), value.clone());
        }
    }

    Ok(Some(Value::Object(summary)))
}

/// Add a directory's bucket into the bucket of its parent
pub fn propagate(
    node: &Node,
    ctx: &mut ProcessingContext,
    config: &Config,
) -> Result<Option<Value>> {
    let Some(parent) = node.parent_key() else {
        return Ok(None);
    };
    let ns = bucket_namespace(config);
    let Some(Value::Object(own)) = ctx.bucket(&[ns, node.key()]).cloned() else {
        return Ok(None);
    };

    let slot = ctx.bucket_or_insert(&[ns, parent], json!({}))?;
    let target = slot
        .as_object_mut()
        .with_context(|| format!("bucket {ns}/{parent} is not a mapping"))?;
    add_numbers(target, &own);
    Ok(None)
}

/// Count the records of the result log so far
pub fn run_summary(
    _node: &Node,
    ctx: &mut ProcessingContext,
    _config: &Config,
) -> Result<Option<Value>> {
    let total = ctx.results().len();
    let errors = ctx
        .results()
        .iter()
        .filter(|r| r.status == Status::Error)
        .count();

    Ok(Some(json!({
        "ok": total - errors,
        "error": errors,
        "total": total,
    })))
}
