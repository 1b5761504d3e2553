use std::sync::Arc;
use std::time::Duration;

use bon::bon;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cancel;
use crate::config::{ClientConfig, HeaderSelector, ToolCallExtractor, ToolDialect};
use crate::error::Error;
use crate::request::{self, CallRequest};
use crate::response::{ChatResult, Usage};
use crate::retry;
use crate::tool;
use crate::transport::{HttpTransport, RawResponse, Transport, TransportError, TransportRequest};

/// Client for OpenAI-compatible chat-completion endpoints.
///
/// Holds no mutable cross-call state; concurrent calls through one
/// instance are fully independent.
#[derive(Clone)]
pub struct ChatClient {
    config: Arc<ClientConfig>,
}

#[bon]
impl ChatClient {
    /// Build a client without assembling a [`ClientConfig`] first.
    #[builder(
        start_fn(name = builder, vis = "pub"),
        finish_fn = build,
        builder_type(vis = "pub"),
        state_mod(vis = "pub")
    )]
    fn from_parts(
        /// Base address of the OpenAI-compatible endpoint.
        #[builder(into)]
        base_url: String,

        /// Bearer credential; omitted from headers when absent.
        api_key: Option<String>,

        /// Model used when a call does not override it.
        #[builder(default, into)]
        model: String,

        /// Per-call timeout; `None` or zero disables the internal timer.
        timeout: Option<Duration>,

        /// Tool-calling wire convention.
        #[builder(default)]
        tool_dialect: ToolDialect,

        /// Transport seam; tests substitute this.
        #[builder(default = Arc::new(HttpTransport::default()))]
        transport: Arc<dyn Transport>,

        /// Endpoint-specific extra headers.
        header_selector: Option<HeaderSelector>,

        /// Overrides the built-in tool-call extractor.
        tool_call_extractor: Option<ToolCallExtractor>,
    ) -> Self {
        Self::new(ClientConfig {
            base_url,
            api_key,
            model,
            timeout,
            tool_dialect,
            transport,
            header_selector,
            tool_call_extractor,
        })
    }
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform one chat completion.
    ///
    /// Assembles the wire body, sends it through the configured
    /// transport, and classifies the response. A rejection matching
    /// the budget-overflow phrasing is retried exactly once with the
    /// clamped budget; every other failure surfaces as-is.
    pub async fn call(&self, request: CallRequest) -> Result<ChatResult, Error> {
        let url = self.config.endpoint()?;
        let headers = self.headers(&url);

        let mut budget = request.requested_budget();
        let mut retries = 0u32;

        loop {
            let body = request::assemble_body(&request, &self.config, budget)?;
            let raw = self
                .dispatch(&url, &headers, body, request.cancel.clone())
                .await?;
            debug!(
                status = raw.status,
                attempt = retries + 1,
                "chat completion response"
            );

            if raw.status >= 400 {
                let parsed = raw.json();
                let message = error_message(&raw, parsed.as_ref());
                let clamp = retry::clamped_budget(&message);
                if retry::should_retry(clamp, budget, retries) {
                    let clamp = clamp.unwrap_or_default();
                    warn!(
                        requested = budget,
                        clamped = clamp,
                        "generation budget exceeds remaining context, retrying once"
                    );
                    retries += 1;
                    budget = Some(clamp);
                    continue;
                }
                return Err(Error::Api {
                    status: raw.status,
                    message,
                    body: parsed.unwrap_or_else(|| Value::String(raw.body)),
                });
            }

            return self.finish(raw);
        }
    }

    /// One transport round trip under a freshly composed token. The
    /// composed guard is released on every path out of this function.
    async fn dispatch(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Map<String, Value>,
        caller: Option<CancellationToken>,
    ) -> Result<RawResponse, Error> {
        let mut guard = cancel::compose(caller, self.config.timeout);
        let outcome = self
            .config
            .transport
            .send(
                TransportRequest {
                    url: url.to_string(),
                    headers: headers.to_vec(),
                    body: Value::Object(body),
                },
                guard.token(),
            )
            .await;
        guard.release();

        match outcome {
            Ok(raw) => Ok(raw),
            Err(TransportError::Cancelled) => Err(Error::Transport(guard.fault())),
            Err(fault) => Err(Error::Transport(fault)),
        }
    }

    fn headers(&self, url: &str) -> Vec<(String, String)> {
        let mut headers = vec![(
            "content-type".to_string(),
            "application/json".to_string(),
        )];
        if let Some(selector) = &self.config.header_selector {
            headers.extend(selector(url));
        }
        if let Some(key) = self.config.api_key.as_deref().filter(|key| !key.is_empty()) {
            headers.push(("authorization".to_string(), format!("Bearer {key}")));
        }
        headers
    }

    /// Package a success-status response, or classify it as malformed.
    fn finish(&self, raw: RawResponse) -> Result<ChatResult, Error> {
        let payload = match raw.json() {
            Some(payload @ Value::Object(_)) => payload,
            _ => {
                let message = if looks_like_html(&raw) {
                    format!(
                        "HTTP {} returned an HTML page instead of JSON; the base URL is probably not an OpenAI-compatible endpoint",
                        raw.status
                    )
                } else {
                    format!("HTTP {} returned invalid JSON", raw.status)
                };
                return Err(Error::MalformedResponse {
                    status: raw.status,
                    message,
                });
            }
        };

        let tool_calls = match &self.config.tool_call_extractor {
            Some(extract) => extract(&payload),
            None => tool::extract_tool_calls(&payload),
        };
        let message = payload.pointer("/choices/0/message").cloned();
        let content = message
            .as_ref()
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let finish_reason = payload
            .pointer("/choices/0/finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string);
        let usage = payload
            .get("usage")
            .and_then(|usage| serde_json::from_value::<Usage>(usage.clone()).ok());

        Ok(ChatResult {
            raw: payload,
            message,
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

/// Diagnostic message for a failed response, in order of preference:
/// structured `error.message`, top-level `message`, raw body text,
/// generic `HTTP <status>`.
fn error_message(raw: &RawResponse, parsed: Option<&Value>) -> String {
    if let Some(parsed) = parsed {
        if let Some(message) = parsed.pointer("/error/message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(message) = parsed.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let text = raw.body.trim();
    if text.is_empty() {
        format!("HTTP {}", raw.status)
    } else {
        text.to_string()
    }
}

/// Heuristic for upstream HTML error pages served with a success
/// status: content-type says html, or the head of the body carries a
/// doctype/html marker.
fn looks_like_html(raw: &RawResponse) -> bool {
    if raw
        .header("content-type")
        .is_some_and(|value| value.to_ascii_lowercase().contains("text/html"))
    {
        return true;
    }
    let head: String = raw.body.chars().take(400).collect::<String>().to_ascii_lowercase();
    head.contains("<!doctype") || head.contains("<html")
}
