//! Built-in processors
//!
//! | Name               | Phases                    | Does                                        |
//! |--------------------|---------------------------|---------------------------------------------|
//! | `count_chars`      | inline                    | adds `{count, chars}` to the parent bucket  |
//! | `summarize`        | post                      | reports a directory bucket                  |
//! | `propagate`        | post                      | adds a directory bucket into its parent     |
//! | `record_to_shared` | every phase               | appends an execution record to `shared`     |
//! | `match_lines`      | inline                    | counts lines matching a regex               |
//! | `backup_file`      | inline                    | copies a file below `backup_dir`            |
//! | `persist_history`  | post, teardown            | appends the newest record to a JSONL file   |
//! | `run_summary`      | teardown                  | counts ok and error records                 |
//!
//! All parameters come from the rule's `config` mapping. Buckets are keyed
//! `[namespace, node key]` where the namespace defaults to `chars`.

use serde_json::{Map, Value};
use tracing::debug;

use crate::context::Config;
use crate::registry::{Phase, ProcessorRegistry, Registration};

mod aggregate;
mod files;
mod record;

pub use aggregate::{count_chars, propagate, run_summary, summarize};
pub use files::{backup_file, match_lines};
pub use record::{persist_history, record_to_shared};

/// Value of `source` on every built-in registration
pub const BUILTIN_SOURCE: &str = "builtin";

/// Default bucket namespace for the aggregation processors
pub const DEFAULT_BUCKET: &str = "chars";

/// Add every built-in processor to `registry`
pub fn register_builtins(registry: &mut ProcessorRegistry) {
    registry.register(builtin(
        Registration::new("count_chars", count_chars),
        &[Phase::Inline],
        "Add {count: 1, chars: N} for a file into its directory's bucket",
    ));
    registry.register(
        builtin(
            Registration::new("summarize", summarize),
            &[Phase::Post],
            "Report the {count, chars} bucket of a directory",
        )
        .priority(10),
    );
    registry.register(builtin(
        Registration::new("propagate", propagate),
        &[Phase::Post],
        "Add a directory's bucket into its parent's bucket",
    ));
    registry.register(builtin(
        Registration::new("record_to_shared", record_to_shared),
        &Phase::ALL,
        "Append an execution record to shared['executed'][key]",
    ));
    registry.register(builtin(
        Registration::new("match_lines", match_lines),
        &[Phase::Inline],
        "Count the lines of a file matching the regex in config 'pattern'",
    ));
    registry.register(builtin(
        Registration::new("backup_file", backup_file),
        &[Phase::Inline],
        "Copy a file below config 'backup_dir', keeping its relative path",
    ));
    registry.register(
        builtin(
            Registration::new("persist_history", persist_history),
            &[Phase::Post, Phase::Teardown],
            "Append the newest result record to log_dir/processed_history.jsonl",
        )
        .priority(-10),
    );
    registry.register(builtin(
        Registration::new("run_summary", run_summary),
        &[Phase::Teardown],
        "Count ok and error records in the result log",
    ));
}

fn builtin(registration: Registration, phases: &[Phase], description: &str) -> Registration {
    registration
        .phases(phases)
        .source(BUILTIN_SOURCE)
        .description(description)
}

/// A registry holding only the built-ins
pub fn default_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    register_builtins(&mut registry);
    registry
}

pub(crate) fn config_str<'a>(config: &'a Config, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

pub(crate) fn bucket_namespace(config: &Config) -> &str {
    config_str(config, "bucket").unwrap_or(DEFAULT_BUCKET)
}

/// Add the numeric fields of `delta` into `target`, creating missing ones.
/// Integer sums that overflow fall back to floats. A field that is not a
/// number on either side is left as it is.
pub(crate) fn add_numbers(target: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, value) in delta {
        if !value.is_number() {
            continue;
        }
        let Some(current) = target.get(key) else {
            target.insert(key.clone(), value.clone());
            continue;
        };

        let exact = match (current.as_i64(), value.as_i64()) {
            (Some(a), Some(b)) => a.checked_add(b).map(Value::from),
            _ => None,
        };
        let sum = match exact {
            Some(sum) => sum,
            None => match (current.as_f64(), value.as_f64()) {
                (Some(a), Some(b)) => Value::from(a + b),
                _ => {
                    debug!(key = %key, "keeping non-numeric bucket field");
                    continue;
                }
            },
        };
        target.insert(key.clone(), sum);
    }
}
