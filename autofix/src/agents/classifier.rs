//! Failure classifier: raw test output to [`FailureReport`].

use anyhow::Result;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, instrument};

use crate::core::types::{ActionSchema, ArgType, FailureReport};
use crate::io::cache::ResponseCache;
use crate::io::gateway::ModelGateway;
use crate::io::model::ModelClient;
use crate::io::prompt::classify_conversation;

use super::non_blank;

pub const ACTION: &str = "get_more_context";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextArgs {
    test_file_path: String,
    test_fail_description: String,
    #[serde(deserialize_with = "line_number")]
    error_location: u32,
}

/// Accept integral line numbers whether the model sent `10`, `10.0` or `"10"`.
fn line_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let line = match &value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(integral),
        _ => None,
    };
    line.and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("expected a line number, got {value}")))
}

fn integral(f: f64) -> Option<u64> {
    (f.is_finite() && f.fract() == 0.0 && f >= 0.0).then_some(f as u64)
}

/// First stage: extracts test file, description, and line from test output.
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    action: ActionSchema,
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureClassifier {
    pub fn new() -> Self {
        Self {
            action: ActionSchema::new(
                ACTION,
                "Based on detected attributes, get more context about the error",
            )
            .arg("testFilePath", ArgType::String, "The path to the test file")
            .arg(
                "testFailDescription",
                ArgType::String,
                "The description of the test failure",
            )
            .arg(
                "errorLocation",
                ArgType::Integer,
                "The location (row number) of the error within the file",
            ),
        }
    }

    #[instrument(skip_all, fields(output_bytes = raw_output.len()))]
    pub fn classify<M: ModelClient, C: ResponseCache>(
        &self,
        gateway: &ModelGateway<M, C>,
        raw_output: &str,
    ) -> Result<FailureReport> {
        let conversation = classify_conversation(raw_output)?;
        let args: ContextArgs = gateway.invoke(&conversation, &self.action)?;
        let report = FailureReport {
            test_file_path: non_blank(ACTION, "testFilePath", args.test_file_path)?,
            description: args.test_fail_description.trim().to_string(),
            location: args.error_location,
        };
        info!(
            test_file = %report.test_file_path,
            line = report.location,
            "failure classified"
        );
        Ok(report)
    }
}
