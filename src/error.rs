//! Error types for rule registration and evaluation.

use thiserror::Error;

use crate::value::ParamPath;

/// Errors produced by the mapping engine and its rule table.
///
/// `Evaluation` errors never escape an evaluation pass; they are collected in
/// the [`crate::engine::EvaluationReport`]. Everything else is returned
/// synchronously from the call that caused it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingError {
    /// A rule's evaluation function failed (or panicked, or produced a non-finite number).
    #[error("rule for '{path}' failed to evaluate: {cause}")]
    Evaluation { path: ParamPath, cause: String },

    /// `patch_rule` was called for a path with no registered rule.
    #[error("no rule registered for '{path}'")]
    UnknownRulePatch { path: ParamPath },

    /// A rule was rejected at registration time.
    #[error("invalid constraints for '{path}': {reason}")]
    InvalidConstraint { path: ParamPath, reason: String },

    /// A string could not be parsed as a parameter path.
    #[error("invalid parameter path '{0}'")]
    InvalidPath(String),

    /// The parameter tree has no field at this path.
    #[error("unknown parameter path '{0}'")]
    UnknownPath(ParamPath),

    /// A value of the wrong kind was written to a typed parameter.
    #[error("type mismatch at '{path}': expected {expected}")]
    TypeMismatch {
        path: ParamPath,
        expected: &'static str,
    },

    /// An absolute safety limit with `min > max` or non-finite bounds.
    #[error("invalid safety limit for '{path}': [{min}, {max}]")]
    InvalidSafetyLimit { path: ParamPath, min: f32, max: f32 },
}

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;
