//! Patch generator: asks for the corrected content of the origin file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::core::types::{ActionSchema, ArgType, Patch, ResolvedOrigin};
use crate::io::cache::ResponseCache;
use crate::io::gateway::ModelGateway;
use crate::io::model::ModelClient;
use crate::io::project::read_source;
use crate::io::prompt::patch_conversation;

pub const ACTION: &str = "write_code";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteCodeArgs {
    file_content: String,
}

/// Third stage: produces a full-file replacement for the origin.
#[derive(Debug, Clone)]
pub struct PatchGenerator {
    action: ActionSchema,
}

impl Default for PatchGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchGenerator {
    pub fn new() -> Self {
        Self {
            action: ActionSchema::new(ACTION, "Writes generated code to the file").arg(
                "fileContent",
                ArgType::String,
                "The complete fixed content of the file",
            ),
        }
    }

    #[instrument(skip_all, fields(origin = %origin))]
    pub fn generate_patch<M: ModelClient, C: ResponseCache>(
        &self,
        gateway: &ModelGateway<M, C>,
        root: &Path,
        origin: &ResolvedOrigin,
        failure_description: &str,
    ) -> Result<Patch> {
        let file_content = read_source(root, origin.as_path()).context("read origin file")?;
        let conversation = patch_conversation(origin, &file_content, failure_description)?;
        let args: WriteCodeArgs = gateway.invoke(&conversation, &self.action)?;
        info!(bytes = args.file_content.len(), "patch generated");
        Ok(Patch {
            content: args.file_content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::path::resolve_origin;
    use crate::error::{FixError, find_fix_error};
    use crate::io::cache::MemoryCache;
    use crate::test_support::{ScriptedModel, TestProject, action};
    use serde_json::json;

    #[test]
    fn generate_patch_returns_replacement_content() {
        let project = TestProject::new().expect("project");
        project
            .write("main.js", "export const add = (a, b) => a - b\n")
            .expect("write");
        let model = ScriptedModel::new(vec![action(
            ACTION,
            json!({"fileContent": "export const add = (a, b) => a + b\n"}),
        )]);
        let gateway = ModelGateway::new(&model, MemoryCache::new());
        let origin = resolve_origin("tests/main.test.js", "../main", "js");

        let patch = PatchGenerator::new()
            .generate_patch(&gateway, project.path(), &origin, "expected 2 to equal 3")
            .expect("patch");

        assert_eq!(patch.content, "export const add = (a, b) => a + b\n");
        let seen = model.conversations();
        assert!(seen[0].messages()[1].content.contains("a - b"));
        // Generating a patch never touches the file.
        assert_eq!(
            project.read("main.js").expect("read"),
            "export const add = (a, b) => a - b\n"
        );
    }

    #[test]
    fn missing_origin_is_file_not_found() {
        let project = TestProject::new().expect("project");
        let model = ScriptedModel::new(Vec::new());
        let gateway = ModelGateway::new(&model, MemoryCache::new());
        let origin = resolve_origin("tests/main.test.js", "../missing", "js");

        let err = PatchGenerator::new()
            .generate_patch(&gateway, project.path(), &origin, "boom")
            .unwrap_err();
        assert!(matches!(
            find_fix_error(&err),
            Some(FixError::FileNotFound { .. })
        ));
    }

    #[test]
    fn missing_file_content_argument_is_protocol_violation() {
        let project = TestProject::new().expect("project");
        project.write("main.js", "x").expect("write");
        let model = ScriptedModel::new(vec![action(ACTION, json!({"content": "y"}))]);
        let gateway = ModelGateway::new(&model, MemoryCache::new());
        let origin = resolve_origin("main.test.js", "./main", "js");

        let err = PatchGenerator::new()
            .generate_patch(&gateway, project.path(), &origin, "boom")
            .unwrap_err();
        assert!(matches!(
            find_fix_error(&err),
            Some(FixError::ProtocolViolation { .. })
        ));
    }
}
