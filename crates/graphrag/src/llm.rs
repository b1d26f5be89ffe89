//! Chat-completion provider implementations.
//!
//! - **[`DisabledChat`]**: returns errors; used when no model is configured.
//! - **[`OpenAIChat`]**: calls `POST /v1/chat/completions` with retry and
//!   backoff. Requires the `OPENAI_API_KEY` environment variable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result as AnyResult};
use async_trait::async_trait;
use serde_json::{json, Value};

use graphrag_core::error::{RagError, Result};
use graphrag_core::llm::{ChatMessage, ChatProvider, CompletionOptions};

use crate::config::LlmConfig;
use crate::retry::post_json_with_retry;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct DisabledChat;

#[async_trait]
impl ChatProvider for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _messages: &[ChatMessage], _options: &CompletionOptions) -> Result<String> {
        Err(RagError::external(
            "chat",
            "llm provider is disabled; set [llm].provider in the config",
        ))
    }
}

pub struct OpenAIChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> AnyResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String> {
        let body = request_body(&self.model, messages, options);

        let response = post_json_with_retry("openai chat", self.max_retries, || {
            self.client
                .post(OPENAI_CHAT_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        parse_completion(&response)
    }
}

fn request_body(model: &str, messages: &[ChatMessage], options: &CompletionOptions) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
        "response_format": { "type": options.response_format },
    })
}

/// Text of the first choice. An empty completion is returned as `""`.
fn parse_completion(json: &Value) -> Result<String> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| RagError::external("openai chat", "response has no choices"))?;

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledChat`] |
/// | `"openai"` | [`OpenAIChat`] |
pub fn create_chat_provider(config: &LlmConfig) -> AnyResult<Arc<dyn ChatProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrag_core::llm::ResponseFormat;

    #[test]
    fn test_request_body_shape() {
        let options = CompletionOptions {
            temperature: 0.0,
            max_tokens: 1500,
            response_format: ResponseFormat::JsonObject,
        };
        let body = request_body("gpt-4-turbo-preview", &[ChatMessage::user("hi")], &options);
        assert_eq!(body["model"], "gpt-4-turbo-preview");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 1500);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_parse_completion() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "Paris"}}]});
        assert_eq!(parse_completion(&ok).unwrap(), "Paris");

        let empty = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
        assert_eq!(parse_completion(&empty).unwrap(), "");

        assert!(parse_completion(&json!({"choices": []})).is_err());
    }

    #[tokio::test]
    async fn test_disabled_chat_errors() {
        let options = CompletionOptions {
            temperature: 0.3,
            max_tokens: 500,
            response_format: ResponseFormat::Text,
        };
        let err = DisabledChat
            .complete(&[ChatMessage::user("q")], &options)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ExternalDependency { .. }));
    }
}
