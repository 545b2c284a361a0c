//! `flowguard-llm`: the LLM provider layer used by the verification pipeline.
//!
//! Every pipeline stage talks to a model through a single method,
//! [`LlmProvider::generate_structured_value`]: a system + user message pair
//! goes in, a JSON value conforming to a caller-supplied schema comes out.
//!
//! # Architecture
//!
//! ```text
//! ChatMessage[] + JSON schema
//!     │
//!     ▼
//! generate_structured::<T>()  ← typed wrapper, maps decode failures to Schema
//!     │
//!     ▼
//! dyn LlmProvider
//!     ├── AnthropicProvider   ← POST /v1/messages, forced tool use, RetryPolicy
//!     └── ClaudeCliProvider   ← spawns `claude --print --output-format json`
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use flowguard_llm::{generate_structured, AnthropicProvider, ChatMessage};
//!
//! let provider = AnthropicProvider::from_env("claude-sonnet-4-6")?;
//! let schema = serde_json::json!({
//!     "type": "object",
//!     "properties": { "answer": { "type": "string" } },
//!     "required": ["answer"]
//! });
//! let out: serde_json::Value = generate_structured(
//!     &provider,
//!     &[ChatMessage::system("Be terse."), ChatMessage::user("Say hi")],
//!     &schema,
//! )
//! .await?;
//! ```

pub mod anthropic;
pub mod error;
pub mod json;
pub(crate) mod process;
pub mod provider;
pub mod retry;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use error::LlmError;
pub use process::ClaudeCliProvider;
pub use provider::{generate_structured, LlmProvider};
pub use retry::RetryPolicy;
pub use types::{ChatMessage, Role};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, LlmError>;
