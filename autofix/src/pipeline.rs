//! Orchestration for a single diagnose-and-fix run.
//!
//! The run is strictly linear: test, classify, trace, resolve, generate,
//! apply, verify. Any stage error aborts the run; a patch that was already
//! written stays on disk.

use std::fmt;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::agents::classifier::FailureClassifier;
use crate::agents::patcher::PatchGenerator;
use crate::agents::tracer::OriginTracer;
use crate::core::path::resolve_origin;
use crate::core::types::ResolvedOrigin;
use crate::exit_codes;
use crate::io::cache::ResponseCache;
use crate::io::config::AutofixConfig;
use crate::io::gateway::ModelGateway;
use crate::io::model::ModelClient;
use crate::io::project::apply_patch;
use crate::io::test_runner::TestRunner;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Testing,
    Classifying,
    Tracing,
    Resolving,
    Generating,
    Applying,
    Verifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Testing => "testing",
            Stage::Classifying => "classifying",
            Stage::Tracing => "tracing",
            Stage::Resolving => "resolving",
            Stage::Generating => "generating",
            Stage::Applying => "applying",
            Stage::Verifying => "verifying",
        };
        f.write_str(name)
    }
}

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The first test run showed no failure signature; no model was called.
    Clean,
    /// The patch was written and the verification run is clean.
    Fixed { origin: ResolvedOrigin },
    /// The patch was written but the verification run still fails.
    NeedsHuman { origin: ResolvedOrigin },
}

impl Outcome {
    pub fn message(&self) -> String {
        match self {
            Outcome::Clean => "No failing tests, exiting.".to_string(),
            Outcome::Fixed { origin } => {
                format!("Auto-fix successful, review the changes to {origin} and commit.")
            }
            Outcome::NeedsHuman { origin } => format!(
                "Tests still fail after rewriting {origin}; human intervention required."
            ),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Clean | Outcome::Fixed { .. } => exit_codes::OK,
            Outcome::NeedsHuman { .. } => exit_codes::NEEDS_HUMAN,
        }
    }
}

fn enter(stage: Stage) {
    info!(stage = %stage, "entering stage");
}

/// Run the pipeline once against `config.workdir`.
pub fn run_pipeline<T, M, C>(
    config: &AutofixConfig,
    test_runner: &T,
    gateway: &ModelGateway<M, C>,
) -> Result<Outcome>
where
    T: TestRunner,
    M: ModelClient,
    C: ResponseCache,
{
    let root = config.workdir.as_path();

    enter(Stage::Testing);
    let first = test_runner.run().context("initial test run")?;
    if !first.has_failures {
        info!("no failure signature in test output");
        return Ok(Outcome::Clean);
    }

    enter(Stage::Classifying);
    let report = FailureClassifier::new()
        .classify(gateway, &first.diagnostics)
        .context("classify failure")?;

    enter(Stage::Tracing);
    let dependency = OriginTracer::new()
        .trace_origin(gateway, root, &report)
        .context("trace failure origin")?;

    enter(Stage::Resolving);
    let origin = resolve_origin(
        &report.test_file_path,
        &dependency.path,
        &config.source_extension,
    );
    info!(origin = %origin, "origin resolved");

    enter(Stage::Generating);
    let patch = PatchGenerator::new()
        .generate_patch(gateway, root, &origin, &report.description)
        .context("generate patch")?;

    enter(Stage::Applying);
    apply_patch(root, &origin, &patch).context("apply patch")?;

    enter(Stage::Verifying);
    let verification = test_runner.run().context("verification test run")?;
    if verification.has_failures {
        warn!(origin = %origin, "tests still fail after patch");
        return Ok(Outcome::NeedsHuman { origin });
    }
    Ok(Outcome::Fixed { origin })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_messages_and_codes() {
        let origin = resolve_origin("tests/main.test.js", "../main", "js");

        assert_eq!(Outcome::Clean.message(), "No failing tests, exiting.");
        assert_eq!(Outcome::Clean.exit_code(), exit_codes::OK);

        let fixed = Outcome::Fixed {
            origin: origin.clone(),
        };
        assert!(fixed.message().contains("main.js"));
        assert_eq!(fixed.exit_code(), exit_codes::OK);

        let stuck = Outcome::NeedsHuman { origin };
        assert!(stuck.message().contains("human intervention required"));
        assert_eq!(stuck.exit_code(), exit_codes::NEEDS_HUMAN);
    }

    #[test]
    fn stage_names_are_lowercase() {
        assert_eq!(Stage::Classifying.to_string(), "classifying");
        assert_eq!(Stage::Verifying.to_string(), "verifying");
    }
}
