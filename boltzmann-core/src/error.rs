//! Error types for Boltzmann sampling.

use thiserror::Error;

/// Main error type for oracle solving and sampling.
///
/// Size overshoot is deliberately absent: an attempt that runs past its
/// ceiling yields [`Step::Aborted`](crate::Step::Aborted) and is retried by
/// the rejection loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoltzmannError {
    /// The oracle iteration did not converge at the requested point.
    #[error("System diverges at type `{type_name}` (x = {point}): {reason}")]
    DivergentSystem {
        type_name: String,
        point: f64,
        reason: String,
    },

    /// A tagged value was read at a type other than the one it carries.
    #[error("Type mismatch: expected `{expected}`, found `{actual}`")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A constructor references a type that is not defined in the system.
    #[error("Undefined type `{name}` referenced by `{referenced_by}`")]
    UndefinedType { name: String, referenced_by: String },

    /// A system without equations cannot be solved.
    #[error("System has no types")]
    EmptySystem,

    /// The rejection loop ran out of attempts.
    #[error("No sample in [{lower}, {upper}] after {attempts} attempts")]
    RetryLimitExceeded {
        attempts: usize,
        lower: usize,
        upper: usize,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type for Boltzmann operations.
pub type Result<T> = std::result::Result<T, BoltzmannError>;

impl BoltzmannError {
    pub(crate) fn divergent(type_name: impl Into<String>, point: f64, reason: impl Into<String>) -> Self {
        BoltzmannError::DivergentSystem {
            type_name: type_name.into(),
            point,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        BoltzmannError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error signals a missing finite base case or alias.
    pub fn is_divergent(&self) -> bool {
        matches!(self, BoltzmannError::DivergentSystem { .. })
    }
}
