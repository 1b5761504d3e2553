use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool schema offered to the model, in the modern `tools` shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub r#type: String,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl Tool {
    pub fn function(function: ToolFunction) -> Self {
        Self {
            r#type: "function".to_string(),
            function,
        }
    }

    pub fn function_with_params(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self::function(ToolFunction {
            name: name.into(),
            description: description.into(),
            parameters: Some(parameters),
        })
    }
}

/// A tool call made by the assistant, as it appears in messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as the provider sent them (a JSON string).
    pub arguments: String,
}

/// Tool choice directive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    None,
    Auto,
    Required,
    #[serde(untagged)]
    Function {
        r#type: String,
        function: ToolChoiceFunction,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolChoiceFunction {
    pub name: String,
}

impl ToolChoice {
    pub fn function(name: impl Into<String>) -> Self {
        Self::Function {
            r#type: "function".to_string(),
            function: ToolChoiceFunction { name: name.into() },
        }
    }

    /// Shape of the directive under the legacy `function_call` field.
    pub(crate) fn legacy_value(&self) -> Value {
        match self {
            ToolChoice::None => Value::String("none".to_string()),
            ToolChoice::Auto => Value::String("auto".to_string()),
            ToolChoice::Required => Value::String("required".to_string()),
            ToolChoice::Function { function, .. } => {
                serde_json::json!({ "name": function.name })
            }
        }
    }
}

/// A normalized tool invocation pulled out of a response payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

/// Default tool-call extractor.
///
/// Reads `choices[0].message.tool_calls`, keeping entries that carry a
/// function name. Stringified argument JSON is parsed best-effort; text
/// that is not valid JSON is kept as a string.
pub fn extract_tool_calls(payload: &Value) -> Vec<ToolInvocation> {
    let Some(calls) = payload
        .pointer("/choices/0/message/tool_calls")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    calls
        .iter()
        .filter_map(|call| {
            let function = call.get("function").unwrap_or(call);
            let name = function.get("name")?.as_str()?.to_string();
            let arguments = match function.get("arguments") {
                Some(Value::String(raw)) => {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
                }
                Some(other) => other.clone(),
                None => Value::Null,
            };
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(ToolInvocation {
                id,
                name,
                arguments,
            })
        })
        .collect()
}
