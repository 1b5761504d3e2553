use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::ToolInvocation;

/// Token accounting reported by the provider. Providers differ in which
/// counters they fill in, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// Outcome of a successful chat-completion call.
#[derive(Debug, Clone)]
pub struct ChatResult {
    /// Full parsed response payload.
    pub raw: Value,

    /// `choices[0].message`, when present.
    pub message: Option<Value>,

    /// Textual content of the first choice; empty when absent.
    pub content: String,

    /// Normalized tool invocations, in provider order.
    pub tool_calls: Vec<ToolInvocation>,

    /// `choices[0].finish_reason`.
    pub finish_reason: Option<String>,

    /// Usage statistics, when reported.
    pub usage: Option<Usage>,
}

impl ChatResult {
    /// Whether the model asked for any tool invocations.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
