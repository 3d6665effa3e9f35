//! Stable exit codes for the `autofix` binary.

/// No failing tests were found, or the fix was applied and verified.
pub const OK: i32 = 0;
/// The run aborted (invalid config, protocol violation, missing file, ...).
pub const ERROR: i32 = 1;
/// A fix was written but the verification run still reports failures.
pub const NEEDS_HUMAN: i32 = 2;
/// The test command exceeded its wall-clock budget and was killed.
pub const TIMED_OUT: i32 = 3;
