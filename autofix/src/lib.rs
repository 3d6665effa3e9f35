//! Single-failure test repair pipeline driven by structured model calls.
//!
//! One invocation runs the project's tests, asks a model to turn the failure
//! output into a structured report, traces the failure to the file that causes
//! it, asks for a corrected version of that file, writes it, and re-runs the
//! tests. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (fingerprints, failure signatures,
//!   path resolution, shared types). No I/O.
//! - **[`io`]**: Side-effecting operations (config, processes, cache storage,
//!   model transport, project files). Each sits behind a trait where tests need
//!   to substitute it.
//! - **[`agents`]**: The three structured-call stages of the pipeline.
//!
//! [`pipeline`] sequences the stages into one run.

pub mod agents;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
