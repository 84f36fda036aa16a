//! Assessment error types.
//!
//! Every failure here is synchronous and terminal for the call that raised it.
//! Numeric degeneracy (NaN information, flat likelihood) is never reported
//! through these types; it is coerced to a safe default where it occurs.

use thiserror::Error;

/// Errors raised by the adaptive engine and the validation toolkit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssessmentError {
    /// Invalid session options or statistical parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A response referenced an item id that is not in the bank.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// A statistical routine received degenerate input.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// An item was constructed with out-of-range parameters.
    #[error("invalid item {id}: {reason}")]
    InvalidItem { id: String, reason: String },

    /// An item id was added to a bank twice.
    #[error("duplicate item id: {0}")]
    DuplicateItem(String),

    /// A response fell outside the item's declared scale.
    #[error("response {response} for item {item_id} is outside scale [{min}, {max}]")]
    ResponseOutOfRange {
        item_id: String,
        response: f64,
        min: f64,
        max: f64,
    },
}

impl AssessmentError {
    /// Returns `true` if the error was caused by the caller's parameters rather
    /// than by the data being analysed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AssessmentError::Configuration(_) | AssessmentError::InvalidItem { .. }
        )
    }
}

/// Convenience alias used across the crate.
pub type AssessmentResult<T> = Result<T, AssessmentError>;
