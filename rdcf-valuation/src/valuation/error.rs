//! Valuation errors.

use thiserror::Error;

/// Errors raised by the valuation engine and the overvaluation scorer.
///
/// Every variant is raised before any number is produced; callers never
/// receive a partially computed result alongside an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    /// A configuration invariant does not hold.
    #[error("Invalid configuration: {field} {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    /// A denominator in the scoring formula is zero.
    #[error("Division by zero: {0} is zero")]
    DivisionByZero(&'static str),

    /// An observed or computed multiple is NaN or infinite.
    #[error("Invalid multiple: {name} = {value} is not a finite number")]
    InvalidMultiple { name: &'static str, value: f64 },

    /// The projection overflowed and produced NaN or infinity.
    #[error("Non-finite result: {quantity} = {value}")]
    NonFiniteResult { quantity: &'static str, value: f64 },
}

impl ValuationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error comes from configuration validation.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }
}
