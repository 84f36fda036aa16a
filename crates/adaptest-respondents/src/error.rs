//! Respondent error types.

use thiserror::Error;

/// Errors raised while configuring or querying respondents.
#[derive(Debug, Error)]
pub enum RespondentError {
    /// A configuration value is out of range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The respondent stopped answering.
    #[error("respondent {id} unavailable after {answered} answers")]
    Unavailable { id: String, answered: u32 },

    /// No scripted answer exists for the presented item.
    #[error("respondent {id} has no answer for item {item_id}")]
    NoAnswer { id: String, item_id: String },
}
