//! Error types for cvxcanon.

use thiserror::Error;

/// Error type for cvxcanon operations.
#[derive(Debug, Error)]
pub enum CvxError {
    /// A node has no rewrite rule and cannot be rebuilt from its type tag and args.
    #[error("Cannot canonicalize {kind}: {reason}")]
    NotReconstructible { kind: String, reason: String },

    /// A value required for evaluation is unavailable (unset parameter, variable).
    #[error("Missing value: {0}")]
    MissingValue(String),

    /// An operator has no numeric semantics.
    #[error("Cannot evaluate: {0}")]
    NotEvaluable(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Invalid problem specification.
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),
}

/// Result type for cvxcanon operations.
pub type Result<T> = std::result::Result<T, CvxError>;
