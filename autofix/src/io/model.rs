//! Model transport.
//!
//! [`ModelClient`] is the seam between the gateway and whatever actually talks
//! to a model. [`OpenAiClient`] speaks the chat-completions protocol with tool
//! calling; tests substitute scripted clients.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::core::types::{ActionInvocation, ActionSchema, Conversation, StructuredResult};
use crate::error::FixError;
use crate::io::config::ModelConfig;

/// One structured model call: a conversation plus the actions the model may
/// invoke.
pub trait ModelClient {
    fn complete(
        &self,
        conversation: &Conversation,
        actions: &[ActionSchema],
    ) -> Result<StructuredResult>;
}

impl<M: ModelClient + ?Sized> ModelClient for &M {
    fn complete(
        &self,
        conversation: &Conversation,
        actions: &[ActionSchema],
    ) -> Result<StructuredResult> {
        (**self).complete(conversation, actions)
    }
}

/// Chat-completions client using blocking HTTP.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    model: String,
    endpoint: String,
    api_key: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(cfg: &ModelConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .context("build http client")?;
        Ok(Self {
            model: cfg.model.clone(),
            endpoint: cfg.endpoint.clone(),
            api_key,
            client,
        })
    }
}

impl ModelClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, messages = conversation.len()))]
    fn complete(
        &self,
        conversation: &Conversation,
        actions: &[ActionSchema],
    ) -> Result<StructuredResult> {
        debug!("calling model");
        let payload = build_payload(&self.model, conversation, actions);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .with_context(|| format!("send request to {}", self.endpoint))?;

        let status = response.status();
        let body = response.text().context("read model response body")?;
        if !status.is_success() {
            return Err(anyhow!(
                "model request failed with status {}: {}",
                status,
                truncate(&body, 500)
            ));
        }
        parse_completion(&body)
    }
}

fn build_payload(model: &str, conversation: &Conversation, actions: &[ActionSchema]) -> Value {
    let messages: Vec<Value> = conversation
        .messages()
        .iter()
        .map(|message| json!({"role": message.role.as_str(), "content": message.content}))
        .collect();
    let tools: Vec<Value> = actions
        .iter()
        .map(|action| {
            json!({
                "type": "function",
                "function": {
                    "name": action.name,
                    "description": action.description,
                    "parameters": action.parameters_schema(),
                }
            })
        })
        .collect();

    let mut payload = json!({
        "model": model,
        "messages": messages,
    });
    if !tools.is_empty() {
        payload["tools"] = json!(tools);
    }
    if let [only] = actions {
        payload["tool_choice"] = json!({"type": "function", "function": {"name": only.name}});
    }
    payload
}

/// Parse a chat-completions response body into a [`StructuredResult`].
///
/// The first tool call (or a legacy `function_call`) becomes an
/// [`ActionInvocation`]; a message without one is plain text.
pub fn parse_completion(body: &str) -> Result<StructuredResult> {
    let value: Value = serde_json::from_str(body).context("parse model response json")?;
    let message = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("unexpected model response: missing choices[0].message"))?;

    let function = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .and_then(|call| call.get("function"))
        .or_else(|| message.get("function_call"));

    let Some(function) = function else {
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(StructuredResult::PlainText { content });
    };

    let name = function
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let arguments = match function.get("arguments") {
        None => Value::Object(Map::new()),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).map_err(|err| {
            FixError::protocol(&name, format!("arguments are not valid JSON: {err}"))
        })?,
        Some(other) => other.clone(),
    };
    let Value::Object(arguments) = arguments else {
        return Err(FixError::protocol(
            &name,
            format!("arguments must be a JSON object, got {arguments}"),
        )
        .into());
    };
    Ok(StructuredResult::ActionInvocation(ActionInvocation {
        name,
        arguments,
    }))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
