//! Model gateway: cached, schema-checked structured calls.
//!
//! Every stage talks to the model through [`ModelGateway`]. A call is looked
//! up in the response cache by conversation fingerprint first; on a miss the
//! model is invoked and the validated answer is stored. Answers that are plain
//! text, name an undeclared action, or carry arguments that fail the action's
//! schema are rejected as [`FixError::ProtocolViolation`] and never cached.

use anyhow::{Context, Result};
use jsonschema::Draft;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::core::fingerprint::fingerprint;
use crate::core::types::{ActionInvocation, ActionSchema, Conversation, StructuredResult};
use crate::error::FixError;
use crate::io::cache::ResponseCache;
use crate::io::model::ModelClient;

pub struct ModelGateway<M, C> {
    client: M,
    cache: C,
}

impl<M: ModelClient, C: ResponseCache> ModelGateway<M, C> {
    pub fn new(client: M, cache: C) -> Self {
        Self { client, cache }
    }

    /// Run one structured call restricted to `actions`.
    #[instrument(skip_all, fields(messages = conversation.len(), actions = %action_names(actions)))]
    pub fn call(
        &self,
        conversation: &Conversation,
        actions: &[ActionSchema],
    ) -> Result<ActionInvocation> {
        let key = fingerprint(conversation);
        if let Some(cached) = self.cache.get(&key).context("read response cache")? {
            info!("using cached model response");
            return validate_result(cached, actions);
        }

        debug!(key = %key, "cache miss, calling model");
        let result = self
            .client
            .complete(conversation, actions)
            .context("model call")?;
        let invocation = validate_result(result, actions)?;
        self.cache
            .put(&key, &StructuredResult::ActionInvocation(invocation.clone()))
            .context("write response cache")?;
        Ok(invocation)
    }

    /// Run a call with exactly one declared action and decode its arguments.
    pub fn invoke<T: DeserializeOwned>(
        &self,
        conversation: &Conversation,
        action: &ActionSchema,
    ) -> Result<T> {
        let invocation = self.call(conversation, std::slice::from_ref(action))?;
        serde_json::from_value(Value::Object(invocation.arguments)).map_err(|err| {
            FixError::protocol(&action.name, format!("arguments could not be decoded: {err}"))
                .into()
        })
    }
}

fn validate_result(
    result: StructuredResult,
    actions: &[ActionSchema],
) -> Result<ActionInvocation> {
    match result {
        StructuredResult::PlainText { content } => Err(FixError::protocol(
            &action_names(actions),
            format!(
                "expected an action call, got plain text: {:?}",
                content.chars().take(200).collect::<String>()
            ),
        )
        .into()),
        StructuredResult::ActionInvocation(invocation) => {
            let action = actions
                .iter()
                .find(|action| action.name == invocation.name)
                .ok_or_else(|| {
                    FixError::protocol(
                        &action_names(actions),
                        format!("model invoked undeclared action {:?}", invocation.name),
                    )
                })?;
            check_arguments(action, &invocation.arguments)?;
            Ok(invocation)
        }
    }
}

/// Validate invocation arguments against the action's JSON Schema.
fn check_arguments(action: &ActionSchema, arguments: &Map<String, Value>) -> Result<()> {
    let schema = action.parameters_schema();
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile action schema")?;
    let instance = Value::Object(arguments.clone());
    let messages: Vec<String> = compiled
        .iter_errors(&instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(FixError::protocol(
            &action.name,
            format!("arguments failed schema validation: {}", messages.join("; ")),
        )
        .into());
    }
    Ok(())
}

fn action_names(actions: &[ActionSchema]) -> String {
    actions
        .iter()
        .map(|action| action.name.as_str())
        .collect::<Vec<_>>()
        .join("|")
}
