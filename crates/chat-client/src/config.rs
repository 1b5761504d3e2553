use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use serde_json::Value;

use crate::error::Error;
use crate::tool::ToolInvocation;
use crate::transport::{HttpTransport, Transport};

/// Relative path joined onto the configured base address.
pub const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

/// Which wire convention describes callable tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolDialect {
    /// Modern `tools` + `tool_choice` fields, passed through unchanged.
    #[default]
    Tools,
    /// Legacy `functions` + `function_call` fields, flattened.
    Functions,
}

/// Contributes endpoint-specific headers for a resolved URL.
/// Pure and synchronous.
pub type HeaderSelector = Arc<dyn Fn(&str) -> Vec<(String, String)> + Send + Sync>;

/// Normalizes tool invocations out of a full parsed response payload.
pub type ToolCallExtractor = Arc<dyn Fn(&Value) -> Vec<ToolInvocation> + Send + Sync>;

/// Client configuration. Constructed once and reused across calls.
#[derive(Clone, Builder)]
pub struct ClientConfig {
    /// Base address of the OpenAI-compatible endpoint.
    #[builder(into)]
    pub base_url: String,

    /// Bearer credential; the authorization header is omitted when absent.
    pub api_key: Option<String>,

    /// Model used when a call does not override it.
    #[builder(default, into)]
    pub model: String,

    /// Per-call timeout; `None` or zero disables the internal timer.
    pub timeout: Option<Duration>,

    /// Tool-calling wire convention.
    #[builder(default)]
    pub tool_dialect: ToolDialect,

    /// Transport seam; tests substitute this.
    #[builder(default = Arc::new(HttpTransport::default()))]
    pub transport: Arc<dyn Transport>,

    /// Endpoint-specific extra headers.
    pub header_selector: Option<HeaderSelector>,

    /// Overrides the built-in tool-call extractor.
    pub tool_call_extractor: Option<ToolCallExtractor>,
}

impl ClientConfig {
    /// Create a config from environment variables: `OPENAI_BASE_URL`
    /// (defaulting to the OpenAI endpoint) and `OPENAI_API_KEY`.
    pub fn from_env() -> Self {
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        Self::builder()
            .base_url(base_url)
            .maybe_api_key(std::env::var("OPENAI_API_KEY").ok())
            .build()
    }

    /// Resolve the absolute chat-completions URL from the configured base.
    ///
    /// Pure: trims whitespace, rejects an empty base, and joins with
    /// exactly one separator regardless of a trailing slash.
    pub fn endpoint(&self) -> Result<String, Error> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(Error::MissingConfig("base_url"));
        }
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        ))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("tool_dialect", &self.tool_dialect)
            .finish_non_exhaustive()
    }
}
