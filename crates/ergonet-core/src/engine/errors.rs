//! Error types for model construction and estimation runs.

use thiserror::Error;

/// Errors that can occur while building a model or driving a chain.
///
/// Hot-path preconditions (arc presence, index bounds) are not reported
/// through this type; they are `debug_assert!`ed and abort debug builds.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExecError {
    /// Inconsistent inputs detected before any sampling begins
    /// (e.g. mismatched vector lengths, unusable statistic selections).
    #[error("validation error: {0}")]
    Validation(String),

    /// Numerical failure during estimation (non-finite parameter values,
    /// degenerate scales).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Runtime failure while driving a chain, including failures raised
    /// by trajectory observers.
    #[error("execution error: {0}")]
    Execution(String),

    /// Programmer error, not user error.
    #[error("internal error: {0}")]
    Internal(String),
}
