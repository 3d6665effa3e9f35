//! Typed failure taxonomy for a pipeline run.
//!
//! Functions return `anyhow::Result` and add context as errors propagate; a
//! [`FixError`] sits at the root of the chain whenever the failure belongs to
//! one of the categories below, so callers can recover it with
//! `err.downcast_ref::<FixError>()`.

use std::path::PathBuf;
use std::time::Duration;

/// Fatal conditions that abort a run.
#[derive(thiserror::Error, Debug)]
pub enum FixError {
    /// The model did not answer through the required action, or the action's
    /// arguments did not match its schema.
    #[error("protocol violation in {action}: {detail}")]
    ProtocolViolation { action: String, detail: String },

    /// A test or origin file named by the model does not exist.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The test command could not be started.
    #[error("test command `{command}` could not be executed: {detail}")]
    ProcessExecution { command: String, detail: String },

    /// The test command did not finish within its budget and was killed.
    #[error("test command `{command}` timed out after {}s", timeout.as_secs())]
    TestTimedOut { command: String, timeout: Duration },

    /// A resolved path points outside the project directory.
    #[error("path {} escapes the project directory", path.display())]
    PathEscapesProject { path: PathBuf },
}

impl FixError {
    pub fn protocol(action: &str, detail: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            action: action.to_string(),
            detail: detail.into(),
        }
    }
}

/// Find the [`FixError`] at the root of an error chain, if any.
pub fn find_fix_error(err: &anyhow::Error) -> Option<&FixError> {
    err.chain().find_map(|cause| cause.downcast_ref::<FixError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn find_fix_error_sees_through_context() {
        let err = Err::<(), _>(FixError::protocol("write_code", "plain text"))
            .context("generate patch")
            .unwrap_err();

        let found = find_fix_error(&err).expect("fix error");
        assert!(matches!(found, FixError::ProtocolViolation { .. }));
        assert!(format!("{err:#}").contains("protocol violation in write_code"));
    }

    #[test]
    fn find_fix_error_returns_none_for_other_errors() {
        let err = anyhow::anyhow!("something else");
        assert!(find_fix_error(&err).is_none());
    }
}
