//! Test execution adapter.
//!
//! The [`TestRunner`] trait decouples the pipeline from where tests run.
//! [`ShellTestRunner`] spawns the configured command locally; tests use
//! scripted runners that replay canned output.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::signature::contains_errors;
use crate::error::FixError;
use crate::io::config::AutofixConfig;
use crate::io::process::{run_command_with_timeout, shell_command};

/// Shell exit codes for "not executable" and "command not found".
const SHELL_CANNOT_EXECUTE: i32 = 126;
const SHELL_NOT_FOUND: i32 = 127;

/// Result of one test-suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    /// Diagnostic text, error stream first.
    pub diagnostics: String,
    /// Whether the diagnostics carry a failure signature.
    pub has_failures: bool,
    pub exit_code: Option<i32>,
}

impl TestRun {
    /// Classify `diagnostics` by failure signature.
    pub fn from_diagnostics(diagnostics: impl Into<String>, exit_code: Option<i32>) -> Self {
        let diagnostics = diagnostics.into();
        Self {
            has_failures: contains_errors(&diagnostics),
            diagnostics,
            exit_code,
        }
    }
}

/// Abstraction over test execution backends.
pub trait TestRunner {
    fn run(&self) -> Result<TestRun>;
}

/// Runs the test command through the local shell.
#[derive(Debug, Clone)]
pub struct ShellTestRunner {
    pub command: String,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    pub include_stdout: bool,
}

impl ShellTestRunner {
    pub fn from_config(cfg: &AutofixConfig) -> Self {
        Self {
            command: cfg.test_command.clone(),
            workdir: cfg.workdir.clone(),
            timeout: cfg.test_timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
            include_stdout: cfg.include_stdout,
        }
    }
}

impl TestRunner for ShellTestRunner {
    #[instrument(skip_all, fields(command = %self.command, workdir = %self.workdir.display()))]
    fn run(&self) -> Result<TestRun> {
        info!("running tests");
        let cmd = shell_command(&self.command, &self.workdir);
        let output =
            run_command_with_timeout(cmd, &self.command, self.timeout, self.output_limit_bytes)
                .context("run test command")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "test command timed out");
            return Err(FixError::TestTimedOut {
                command: self.command.clone(),
                timeout: self.timeout,
            }
            .into());
        }

        let stderr = output.stderr_text();
        let exit_code = output.status.code();
        if matches!(exit_code, Some(SHELL_CANNOT_EXECUTE | SHELL_NOT_FOUND)) {
            return Err(FixError::ProcessExecution {
                command: self.command.clone(),
                detail: format!("shell exited with {:?}: {}", exit_code, stderr.trim()),
            }
            .into());
        }

        let mut diagnostics = stderr;
        if self.include_stdout {
            if !diagnostics.is_empty() && !diagnostics.ends_with('\n') {
                diagnostics.push('\n');
            }
            diagnostics.push_str(&output.stdout_text());
        }

        let run = TestRun::from_diagnostics(diagnostics, exit_code);
        debug!(
            exit_code = ?run.exit_code,
            has_failures = run.has_failures,
            bytes = run.diagnostics.len(),
            "tests finished"
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_diagnostics_classifies_by_signature() {
        let failing = TestRun::from_diagnostics("FAIL tests/main.test.js", Some(1));
        assert!(failing.has_failures);

        let clean = TestRun::from_diagnostics("5 passing", Some(0));
        assert!(!clean.has_failures);
    }

    #[cfg(unix)]
    fn runner(command: &str, dir: &std::path::Path) -> ShellTestRunner {
        ShellTestRunner {
            command: command.to_string(),
            workdir: dir.to_path_buf(),
            timeout: Duration::from_secs(10),
            output_limit_bytes: 10_000,
            include_stdout: false,
        }
    }

    #[cfg(unix)]
    #[test]
    fn stderr_is_the_diagnostic_stream() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = runner("echo '1 failing' ; echo 'FAIL x' 1>&2; exit 1", temp.path())
            .run()
            .expect("run");
        assert_eq!(run.diagnostics, "FAIL x\n");
        assert!(run.has_failures);
        assert_eq!(run.exit_code, Some(1));
    }

    #[cfg(unix)]
    #[test]
    fn stdout_only_failures_are_ignored_unless_included() {
        let temp = tempfile::tempdir().expect("tempdir");
        let run = runner("echo '1 failing'", temp.path()).run().expect("run");
        assert!(!run.has_failures);

        let mut with_stdout = runner("echo '1 failing'", temp.path());
        with_stdout.include_stdout = true;
        let run = with_stdout.run().expect("run");
        assert!(run.has_failures);
    }

    #[cfg(unix)]
    #[test]
    fn included_stdout_starts_on_its_own_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut both = runner("printf 'FAIL x' 1>&2; echo '1 passing'", temp.path());
        both.include_stdout = true;
        let run = both.run().expect("run");
        assert_eq!(run.diagnostics, "FAIL x\n1 passing\n");
    }

    #[cfg(unix)]
    #[test]
    fn background_job_holding_output_does_not_stall_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut forking = runner("sleep 1000 & echo 'FAIL x' 1>&2", temp.path());
        forking.timeout = Duration::from_millis(500);
        let started = std::time::Instant::now();
        let run = forking.run().expect("run");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(run.diagnostics, "FAIL x\n");
        assert!(run.has_failures);
    }

    #[cfg(unix)]
    #[test]
    fn missing_command_is_not_a_clean_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = runner("definitely-not-a-test-command-autofix", temp.path())
            .run()
            .unwrap_err();
        assert!(matches!(
            crate::error::find_fix_error(&err),
            Some(FixError::ProcessExecution { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn hanging_command_times_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut slow = runner("sleep 5", temp.path());
        slow.timeout = Duration::from_millis(200);
        let err = slow.run().unwrap_err();
        assert!(matches!(
            crate::error::find_fix_error(&err),
            Some(FixError::TestTimedOut { .. })
        ));
    }
}
