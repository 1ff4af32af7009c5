use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::Phase;

/// Outcome classification of a result record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// One entry of the run's result log
///
/// Only `status` and `message` are guaranteed; everything else is optional
/// and `fields` holds whatever the producer wants to add. Serialized records
/// are flat: free-form fields sit next to the fixed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ResultRecord {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            phase: None,
            processor: None,
            path: None,
            fields: Map::new(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::Ok, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Error, message)
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = Some(processor.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// One processor call as observed by the scheduler, in call order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub phase: Phase,
    pub path: String,
    pub processor: String,
    pub succeeded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_flat() {
        let record = ResultRecord::ok("count_chars completed")
            .with_phase(Phase::Inline)
            .with_processor("count_chars")
            .with_path("data/a.txt")
            .with_field("result", json!({"chars": 3}));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["phase"], "inline");
        assert_eq!(value["result"]["chars"], 3);

        let back: ResultRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_minimal_record_omits_optional_keys() {
        let value = serde_json::to_value(ResultRecord::error("boom")).unwrap();
        assert_eq!(value, json!({"status": "error", "message": "boom"}));
    }
}
