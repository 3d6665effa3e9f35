//! Test-only collaborators: scripted model and test runner, temp projects.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::types::{ActionInvocation, ActionSchema, Conversation, StructuredResult};
use crate::io::config::AutofixConfig;
use crate::io::model::ModelClient;
use crate::io::test_runner::{TestRun, TestRunner};

/// Build an action invocation result. `arguments` must be a JSON object.
pub fn action(name: &str, arguments: Value) -> StructuredResult {
    let arguments = match arguments {
        Value::Object(map) => map,
        other => panic!("scripted arguments must be an object, got {other}"),
    };
    StructuredResult::ActionInvocation(ActionInvocation {
        name: name.to_string(),
        arguments,
    })
}

pub fn plain_text(content: &str) -> StructuredResult {
    StructuredResult::PlainText {
        content: content.to_string(),
    }
}

/// Model client that replays queued results and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: RefCell<VecDeque<StructuredResult>>,
    seen: RefCell<Vec<Conversation>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<StructuredResult>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    /// Number of times the model was actually invoked.
    pub fn calls(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.seen.borrow().clone()
    }
}

impl ModelClient for ScriptedModel {
    fn complete(
        &self,
        conversation: &Conversation,
        _actions: &[ActionSchema],
    ) -> Result<StructuredResult> {
        self.seen.borrow_mut().push(conversation.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted model has no response left"))
    }
}

/// Test runner that replays queued runs in order.
#[derive(Debug, Default)]
pub struct ScriptedTestRunner {
    runs: RefCell<VecDeque<TestRun>>,
    count: RefCell<usize>,
}

impl ScriptedTestRunner {
    pub fn new(runs: Vec<TestRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            count: RefCell::new(0),
        }
    }

    /// A run whose diagnostics are `stderr`.
    pub fn output(stderr: &str) -> TestRun {
        TestRun::from_diagnostics(stderr, Some(if stderr.is_empty() { 0 } else { 1 }))
    }

    pub fn runs(&self) -> usize {
        *self.count.borrow()
    }
}

impl TestRunner for ScriptedTestRunner {
    fn run(&self) -> Result<TestRun> {
        *self.count.borrow_mut() += 1;
        self.runs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted test runner has no run left"))
    }
}

/// Temporary project directory.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create temp project")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path().join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Default config pointed at this project, caching under `llm-cache/`.
    pub fn config(&self) -> AutofixConfig {
        AutofixConfig {
            workdir: self.path().to_path_buf(),
            cache_dir: self.path().join("llm-cache"),
            ..AutofixConfig::default()
        }
    }
}
