pub mod error;
pub mod value;
pub mod signals;
pub mod clock;
pub mod scene;
pub mod config;
pub mod diagnostics;

// Rule model and evaluation
pub mod rule;
pub mod rule_table;
pub mod builtin_rules;
pub mod reason;
pub mod engine;

// Asynchronous override producer
pub mod meta_mapping;

pub mod cli;

pub use engine::{merge_updates, resolve_conflicts, EvaluationReport, MappingEngine};
pub use error::{MappingError, MappingResult};
pub use rule::{Constraints, MappingContext, Rule, RulePatch, Source, Update};
pub use rule_table::RuleTable;
pub use scene::{ParamMap, SceneParams, SceneSnapshot};
pub use value::{ParamPath, Value};
