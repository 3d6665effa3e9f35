//! Conversation rendering for the pipeline stages.
//!
//! Prompt text lives in `prompts/*.md` and is rendered with minijinja. The
//! user messages put the run-specific values (paths, failure description) at
//! the start and end of the text, since those edges are what the response
//! cache fingerprints.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::types::{Conversation, FailureReport, Message, ResolvedOrigin};

const CLASSIFY_SYSTEM_TEMPLATE: &str = include_str!("prompts/classify_system.md");
const DEBUG_SYSTEM_TEMPLATE: &str = include_str!("prompts/debug_system.md");
const TRACE_TEMPLATE: &str = include_str!("prompts/trace_user.md");
const PATCH_TEMPLATE: &str = include_str!("prompts/patch_user.md");

static ENGINE: LazyLock<PromptEngine> = LazyLock::new(PromptEngine::new);

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("classify_system", CLASSIFY_SYSTEM_TEMPLATE)
            .expect("classify_system template should be valid");
        env.add_template("debug_system", DEBUG_SYSTEM_TEMPLATE)
            .expect("debug_system template should be valid");
        env.add_template("trace", TRACE_TEMPLATE)
            .expect("trace template should be valid");
        env.add_template("patch", PATCH_TEMPLATE)
            .expect("patch template should be valid");
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        template
            .render(ctx)
            .with_context(|| format!("render {name} prompt"))
    }
}

/// Conversation asking the model to turn raw test output into a failure report.
pub fn classify_conversation(raw_output: &str) -> Result<Conversation> {
    let system = ENGINE.render("classify_system", context! {})?;
    Ok(Conversation::new()
        .with(Message::system(system))
        .with(Message::user(raw_output)))
}

/// Conversation asking the model which file is responsible for the failure.
pub fn trace_conversation(report: &FailureReport, test_content: &str) -> Result<Conversation> {
    let test_file_name = Path::new(&report.test_file_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.test_file_path.clone());
    let system = ENGINE.render("debug_system", context! {})?;
    let user = ENGINE.render(
        "trace",
        context! {
            test_file_path => report.test_file_path,
            test_file_name => test_file_name,
            test_content => test_content.trim_end(),
            description => report.description.trim(),
            location => report.location,
        },
    )?;
    Ok(Conversation::new()
        .with(Message::system(system))
        .with(Message::user(user)))
}

/// Conversation asking the model for the corrected content of `origin`.
pub fn patch_conversation(
    origin: &ResolvedOrigin,
    file_content: &str,
    description: &str,
) -> Result<Conversation> {
    let system = ENGINE.render("debug_system", context! {})?;
    let user = ENGINE.render(
        "patch",
        context! {
            path => origin.to_string(),
            file_content => file_content.trim_end(),
            description => description.trim(),
        },
    )?;
    Ok(Conversation::new()
        .with(Message::system(system))
        .with(Message::user(user)))
}
