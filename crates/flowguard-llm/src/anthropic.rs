use async_trait::async_trait;
use serde::Deserialize;

use crate::provider::LlmProvider;
use crate::retry::RetryPolicy;
use crate::types::{split_system, ChatMessage};
use crate::{LlmError, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const TOOL_NAME: &str = "structured_output";

// ─── AnthropicProvider ────────────────────────────────────────────────────

/// Messages API backend.
///
/// Structured output is obtained by declaring a single tool whose
/// `input_schema` is the requested schema and forcing the model to call it;
/// the tool call's `input` is the structured value.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            retry: RetryPolicy::default(),
        }
    }

    /// Read the API key from `ANTHROPIC_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        Self::from_env_var("ANTHROPIC_API_KEY", model)
    }

    pub fn from_env_var(var: &str, model: impl Into<String>) -> Result<Self> {
        let key = std::env::var(var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(var.to_string()))?;
        Ok(Self::new(key, model))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, messages: &[ChatMessage], schema: &serde_json::Value) -> serde_json::Value {
        let (system, turns) = split_system(messages);
        let turns: Vec<serde_json::Value> = turns
            .iter()
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": turns,
            "tools": [{
                "name": TOOL_NAME,
                "description": "Return the response in the required structure.",
                "input_schema": schema,
            }],
            "tool_choice": { "type": "tool", "name": TOOL_NAME },
        });
        if let Some(system) = system {
            body["system"] = serde_json::Value::String(system);
        }
        body
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = resp.json().await?;
        parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ResponseBlock::ToolUse { name, input } if name == TOOL_NAME => Some(input),
                _ => None,
            })
            .ok_or_else(|| LlmError::Schema("response contained no structured_output tool call".into()))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate_structured_value(
        &self,
        messages: &[ChatMessage],
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = self.request_body(messages, schema);
        tracing::debug!(model = %self.model, turns = messages.len(), "sending messages request");
        let body = &body;
        self.retry.run(move || self.send_once(body)).await
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "severity": { "type": "string" } },
            "required": ["severity"]
        })
    }

    fn provider(url: &str) -> AnthropicProvider {
        AnthropicProvider::new("test-key", "claude-test")
            .with_base_url(url)
            .with_retry(RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 1,
            })
    }

    #[test]
    fn request_body_forces_tool_and_lifts_system() {
        let p = AnthropicProvider::new("k", "m");
        let body = p.request_body(
            &[ChatMessage::system("rules"), ChatMessage::user("data")],
            &schema(),
        );
        assert_eq!(body["system"], "rules");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["tool_choice"]["name"], TOOL_NAME);
        assert_eq!(body["tools"][0]["input_schema"]["required"][0], "severity");
    }

    #[tokio::test]
    async fn returns_tool_input() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"content":[
                    {"type":"text","text":"thinking"},
                    {"type":"tool_use","id":"tu_1","name":"structured_output","input":{"severity":"High"}}
                ]}"#,
            )
            .create_async()
            .await;

        let out = provider(&server.url())
            .generate_structured_value(&[ChatMessage::user("rate")], &schema())
            .await
            .unwrap();
        assert_eq!(out["severity"], "High");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(503)
            .with_body("overloaded")
            .expect(2)
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate_structured_value(&[ChatMessage::user("rate")], &schema())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 503, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_tool_call_is_schema_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content":[{"type":"text","text":"no tools today"}]}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate_structured_value(&[ChatMessage::user("rate")], &schema())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }

    #[test]
    fn from_env_var_missing_key() {
        let err = AnthropicProvider::from_env_var("FLOWGUARD_TEST_UNSET_KEY_VAR", "m").unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey(_)));
    }
}
