use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::types::ChatMessage;
use crate::{LlmError, Result};

// ─── LlmProvider ──────────────────────────────────────────────────────────

/// A model backend capable of schema-constrained generation.
///
/// Implementations own their transport concerns (auth, retries, process
/// lifetime). Callers only see a JSON value that should conform to `schema`;
/// conformance is checked by [`generate_structured`] when decoding.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short name used in logs (`anthropic`, `claude_cli`, ...).
    fn name(&self) -> &str;

    async fn generate_structured_value(
        &self,
        messages: &[ChatMessage],
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value>;
}

// ─── Typed helper ─────────────────────────────────────────────────────────

/// Run a structured generation and decode the result into `T`.
///
/// A value that does not deserialize into `T` is reported as
/// [`LlmError::Schema`] so callers can tell a malformed response apart from
/// a transport failure.
pub async fn generate_structured<T, P>(
    provider: &P,
    messages: &[ChatMessage],
    schema: &serde_json::Value,
) -> Result<T>
where
    T: DeserializeOwned,
    P: LlmProvider + ?Sized,
{
    let value = provider.generate_structured_value(messages, schema).await?;
    tracing::debug!(provider = provider.name(), "structured response received");
    serde_json::from_value(value).map_err(|e| LlmError::Schema(e.to_string()))
}
