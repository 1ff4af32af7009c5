//! Error types for the traversal engine
//!
//! Configuration errors abort a run before (or at the point where) they are
//! detected. Processor failures never surface here unless the engine runs in
//! fail-fast mode; otherwise they are recorded in the result log.

use std::path::PathBuf;
use thiserror::Error;

use crate::registry::Phase;

/// Engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("'{rule}' references unknown processor '{name}' in the {phase} phase")]
    UnknownProcessor {
        name: String,
        rule: String,
        phase: Phase,
    },

    #[error("processor '{name}' is not registered for the {phase} phase (used by '{rule}')")]
    PhaseMismatch {
        name: String,
        rule: String,
        phase: Phase,
    },

    #[error("traversal cycle: {} re-enters open ancestor {}", path.display(), ancestor.display())]
    CycleDetected { path: PathBuf, ancestor: PathBuf },

    #[error("maximum depth {limit} exceeded at {}", path.display())]
    DepthLimit { path: PathBuf, limit: usize },

    #[error("root directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("failed to parse rule source {origin}: {reason}")]
    RuleSource { origin: String, reason: String },

    #[error("processor '{processor}' failed on '{path}' during {phase}: {message}")]
    ProcessorFailed {
        processor: String,
        phase: Phase,
        path: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for errors caused by the rule table, settings or tree shape
    /// rather than by a processor or the filesystem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidPattern { .. }
                | EngineError::UnknownProcessor { .. }
                | EngineError::PhaseMismatch { .. }
                | EngineError::CycleDetected { .. }
                | EngineError::DepthLimit { .. }
                | EngineError::RootNotFound(_)
                | EngineError::RuleSource { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;
