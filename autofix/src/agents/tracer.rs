//! Origin tracer: finds the file that actually causes a failure.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::core::types::{ActionSchema, ArgType, DependencyReference, FailureReport};
use crate::io::cache::ResponseCache;
use crate::io::gateway::ModelGateway;
use crate::io::model::ModelClient;
use crate::io::project::read_source;
use crate::io::prompt::trace_conversation;

use super::non_blank;

pub const ACTION: &str = "get_dependency";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DependencyArgs {
    dependency_path: String,
}

/// Second stage: asks which file (the test or one of its dependencies) is
/// responsible for the failure.
#[derive(Debug, Clone)]
pub struct OriginTracer {
    action: ActionSchema,
}

impl Default for OriginTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginTracer {
    pub fn new() -> Self {
        Self {
            action: ActionSchema::new(ACTION, "Get file content of the dependency").arg(
                "dependencyPath",
                ArgType::String,
                "The path to the dependency file, as referenced from the test file",
            ),
        }
    }

    /// Read the failing test file from `root` and ask the model for the origin.
    #[instrument(skip_all, fields(test_file = %report.test_file_path))]
    pub fn trace_origin<M: ModelClient, C: ResponseCache>(
        &self,
        gateway: &ModelGateway<M, C>,
        root: &Path,
        report: &FailureReport,
    ) -> Result<DependencyReference> {
        let test_content = read_source(root, Path::new(&report.test_file_path))
            .context("read failing test file")?;
        let conversation = trace_conversation(report, &test_content)?;
        let args: DependencyArgs = gateway.invoke(&conversation, &self.action)?;
        let dependency = DependencyReference {
            path: non_blank(ACTION, "dependencyPath", args.dependency_path)?,
        };
        info!(dependency = %dependency.path, "origin traced");
        Ok(dependency)
    }
}
