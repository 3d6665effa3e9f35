//! Structured-call stages of the pipeline.
//!
//! Each stage owns the single action it allows the model to invoke, renders
//! its conversation, and decodes the action's arguments into a typed record.

pub mod classifier;
pub mod patcher;
pub mod tracer;

use crate::error::FixError;

/// Reject blank string arguments that passed schema validation.
pub(crate) fn non_blank(action: &str, field: &str, value: String) -> Result<String, FixError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FixError::protocol(action, format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
