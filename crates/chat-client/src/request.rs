use bon::Builder;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, ToolDialect};
use crate::error::Error;
use crate::message::Message;
use crate::tool::{Tool, ToolChoice};

/// One chat-completion invocation. Caller-owned, discarded after the
/// call returns or raises.
#[derive(Debug, Clone, Default, Builder)]
#[builder(builder_type(vis = "pub"), state_mod(vis = "pub"))]
pub struct CallRequest {
    /// Ordered conversation messages.
    #[builder(field)]
    pub messages: Vec<Message>,

    /// Model override; falls back to the configured default.
    #[builder(into)]
    pub model: Option<String>,

    /// Tool schemas offered to the model.
    pub tools: Option<Vec<Tool>>,

    /// Tool-choice directive; only sent when tools are supplied.
    pub tool_choice: Option<ToolChoice>,

    /// Requested generation budget; zero means unspecified.
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Top-p sampling parameter
    pub top_p: Option<f32>,

    /// Top-k sampling parameter
    pub top_k: Option<u32>,

    /// Min-p sampling parameter
    pub min_p: Option<f32>,

    /// Repetition penalty
    pub repetition_penalty: Option<f32>,

    /// Free-form fields merged into the wire body last. A field set to
    /// `null` is skipped rather than overwriting with emptiness.
    pub extra: Option<Map<String, Value>>,

    /// Caller-supplied cancellation token.
    pub cancel: Option<CancellationToken>,
}

impl CallRequest {
    /// The requested generation budget, with zero normalized to absent.
    pub(crate) fn requested_budget(&self) -> Option<u32> {
        self.max_tokens.filter(|budget| *budget > 0)
    }
}

// Builder extensions for convenience methods
impl<S: call_request_builder::State> CallRequestBuilder<S> {
    /// Replace the message list wholesale.
    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages = messages.into_iter().collect();
        self
    }

    /// Add a message
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add a user message
    pub fn user_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Add an assistant message
    pub fn assistant_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    /// Add a system message
    pub fn system_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }
}

/// Map a [`CallRequest`] into the provider wire body.
///
/// `budget` is the working generation budget: the caller's requested
/// value on the first attempt, the clamped value on the retry. Rules
/// are applied in order; caller extras are merged last and may
/// overwrite any computed field.
pub(crate) fn assemble_body(
    request: &CallRequest,
    config: &ClientConfig,
    budget: Option<u32>,
) -> Result<Map<String, Value>, Error> {
    let model = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| config.model.trim());
    if model.is_empty() {
        return Err(Error::MissingConfig("model"));
    }

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert(
        "messages".to_string(),
        serde_json::to_value(&request.messages)?,
    );
    // Streaming is never requested by this client.
    body.insert("stream".to_string(), Value::Bool(false));

    if let Some(budget) = budget.filter(|budget| *budget > 0) {
        body.insert("max_tokens".to_string(), Value::from(budget));
    }
    if let Some(temperature) = request.temperature {
        body.insert("temperature".to_string(), Value::from(temperature));
    }
    if let Some(top_p) = request.top_p {
        body.insert("top_p".to_string(), Value::from(top_p));
    }
    if let Some(top_k) = request.top_k {
        body.insert("top_k".to_string(), Value::from(top_k));
    }
    if let Some(min_p) = request.min_p {
        body.insert("min_p".to_string(), Value::from(min_p));
    }
    if let Some(penalty) = request.repetition_penalty {
        body.insert("repetition_penalty".to_string(), Value::from(penalty));
    }

    if let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) {
        match config.tool_dialect {
            ToolDialect::Tools => {
                body.insert("tools".to_string(), serde_json::to_value(tools)?);
                if let Some(choice) = &request.tool_choice {
                    body.insert("tool_choice".to_string(), serde_json::to_value(choice)?);
                }
            }
            ToolDialect::Functions => {
                let functions: Vec<Value> = tools
                    .iter()
                    .filter(|tool| tool.r#type == "function" && !tool.function.name.is_empty())
                    .map(|tool| {
                        let mut flat = Map::new();
                        flat.insert(
                            "name".to_string(),
                            Value::String(tool.function.name.clone()),
                        );
                        flat.insert(
                            "description".to_string(),
                            Value::String(tool.function.description.clone()),
                        );
                        if let Some(parameters) = &tool.function.parameters {
                            flat.insert("parameters".to_string(), parameters.clone());
                        }
                        Value::Object(flat)
                    })
                    .collect();
                body.insert("functions".to_string(), Value::Array(functions));
                if let Some(choice) = &request.tool_choice {
                    body.insert("function_call".to_string(), choice.legacy_value());
                }
            }
        }
    }

    if let Some(extra) = &request.extra {
        for (key, value) in extra {
            if value.is_null() {
                continue;
            }
            body.insert(key.clone(), value.clone());
        }
    }

    // Extras may have replaced `messages`; the wire schema still
    // requires a sequence.
    if !body.get("messages").is_some_and(Value::is_array) {
        return Err(Error::InvalidInput(
            "messages must be a sequence".to_string(),
        ));
    }

    Ok(body)
}
