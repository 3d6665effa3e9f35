//! Records exchanged between pipeline stages and with the model gateway.
//!
//! Every record is immutable once produced; a stage consumes its
//! predecessor's output and returns a new value.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only message history consumed by a single model call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, returning the extended conversation.
    pub fn with(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// JSON type of a declared action argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Integer,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    #[serde(rename = "type")]
    pub kind: ArgType,
    pub description: String,
}

/// Contract a model response must satisfy for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    pub description: String,
    pub arguments: BTreeMap<String, ArgSpec>,
}

impl ActionSchema {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            arguments: BTreeMap::new(),
        }
    }

    /// Declare a required argument.
    pub fn arg(mut self, name: &str, kind: ArgType, description: &str) -> Self {
        self.arguments.insert(
            name.to_string(),
            ArgSpec {
                kind,
                description: description.to_string(),
            },
        );
        self
    }

    /// JSON Schema (draft 2020-12) describing the argument object.
    ///
    /// All declared arguments are required. Line-number style `Integer`
    /// arguments must be non-negative and may also arrive as numeric strings.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for (name, spec) in &self.arguments {
            let property = match spec.kind {
                ArgType::Integer => json!({
                    "type": ["integer", "string"],
                    "minimum": 0,
                    "pattern": r"^\s*[0-9]+(\.0*)?\s*$",
                    "description": spec.description,
                }),
                kind => json!({
                    "type": kind,
                    "description": spec.description,
                }),
            };
            properties.insert(name.clone(), property);
        }
        let required: Vec<&String> = self.arguments.keys().collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A model response that invoked one of the declared actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Everything the model transport can hand back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuredResult {
    ActionInvocation(ActionInvocation),
    PlainText { content: String },
}

/// Structured description of the failing test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Test file path relative to the project directory.
    pub test_file_path: String,
    pub description: String,
    /// Line of the failure within the test file.
    pub location: u32,
}

/// File the model blames for the failure, relative to the test file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReference {
    pub path: String,
}

/// Project-relative path of the origin file, always carrying the source
/// extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOrigin(PathBuf);

impl ResolvedOrigin {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Full replacement content for the origin file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub content: String,
}
