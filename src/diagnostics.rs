//! Structured mapping diagnostics.
//!
//! Wraps [`MappingError`] into a stable, JSON-serializable shape that callers
//! (the CLI, a UI panel) can surface without reading Rust logs.

use serde::Serialize;

use crate::error::MappingError;
use crate::value::ParamPath;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A rule failed during an evaluation pass.
    EvaluationError,
    /// A rule or safety limit was rejected at registration.
    InvalidConstraint,
    /// A patch targeted a path with no rule.
    UnknownRule,
    /// A path was malformed or absent from the parameter tree.
    InvalidPath,
    /// A value did not match the parameter's type.
    TypeMismatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingDiagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<ParamPath>,
    pub message: String,
}

impl From<&MappingError> for MappingDiagnostic {
    fn from(err: &MappingError) -> Self {
        let (kind, path) = match err {
            MappingError::Evaluation { path, .. } => (DiagnosticKind::EvaluationError, Some(path)),
            MappingError::InvalidConstraint { path, .. }
            | MappingError::InvalidSafetyLimit { path, .. } => {
                (DiagnosticKind::InvalidConstraint, Some(path))
            }
            MappingError::UnknownRulePatch { path } => (DiagnosticKind::UnknownRule, Some(path)),
            MappingError::InvalidPath(_) => (DiagnosticKind::InvalidPath, None),
            MappingError::UnknownPath(path) => (DiagnosticKind::InvalidPath, Some(path)),
            MappingError::TypeMismatch { path, .. } => (DiagnosticKind::TypeMismatch, Some(path)),
        };

        MappingDiagnostic {
            kind,
            path: path.cloned(),
            message: err.to_string(),
        }
    }
}

/// Convert a batch of errors, e.g. [`crate::engine::EvaluationReport::errors`].
pub fn from_errors(errors: &[MappingError]) -> Vec<MappingDiagnostic> {
    errors.iter().map(MappingDiagnostic::from).collect()
}
