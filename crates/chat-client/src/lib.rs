//! Client for OpenAI-compatible chat-completion endpoints.
//!
//! One exchange per call: assemble the provider wire body from a
//! [`CallRequest`], send it through an injectable [`Transport`], and
//! classify the response. A rejection for a generation budget that no
//! longer fits the model's context window is retried exactly once with
//! a clamped budget.
//!
//! # Example
//!
//! ```rust,no_run
//! use chat_client::{CallRequest, ChatClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::builder()
//!         .base_url("https://api.openai.com/v1")
//!         .api_key("your-api-key".to_string())
//!         .model("gpt-4o-mini")
//!         .build();
//!
//!     let request = CallRequest::builder()
//!         .user_message("Hello, world!")
//!         .max_tokens(100)
//!         .build();
//!
//!     let result = client.call(request).await?;
//!     println!("{}", result.content);
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod request;
pub mod response;
mod retry;
pub mod tool;
pub mod transport;

// Re-export main types
pub use client::ChatClient;
pub use config::{ClientConfig, HeaderSelector, ToolCallExtractor, ToolDialect};
pub use error::Error;
pub use message::{Message, Role};
pub use request::CallRequest;
pub use response::{ChatResult, Usage};
pub use tool::{FunctionCall, Tool, ToolCall, ToolChoice, ToolFunction, ToolInvocation};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError, TransportRequest};
