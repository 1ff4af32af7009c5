//! Configuration for dirflow
//!
//! Two kinds of files are read here:
//!
//! - **settings** (`[engine]` knobs) through a layered figment stack, see
//!   [`DirflowConfig`]
//! - **rule files** (the pattern table and run hooks), parsed directly so the
//!   pattern order survives, see [`rules`]

mod core;
pub mod formats;
pub mod rules;

pub use self::core::{DirflowConfig, EngineOverrides};
pub(crate) use self::core::flag;
pub use formats::ConfigFormat;
pub use rules::{load_rule_source, write_template};
