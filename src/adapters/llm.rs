use crate::core::retry::{retry, RetryPolicy};
use crate::domain::ports::LlmClient;
use crate::utils::error::{ProcureError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Anthropic Messages API 用戶端
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl AnthropicClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            max_tokens,
            retry,
        })
    }

    async fn send_once(&self, api_key: &str, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        tracing::debug!("Calling model {} ({} prompt chars)", self.model, prompt.len());
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcureError::UpstreamError {
                service: "anthropic".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProcureError::model_output("model returned no text content"));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProcureError::MissingConfigError {
                field: "llm.api_key".to_string(),
            })?;

        retry(&self.retry, "model call", || self.send_once(api_key, system, prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(base_url: &str, api_key: Option<&str>) -> AnthropicClient {
        AnthropicClient::new(
            base_url,
            api_key.map(str::to_string),
            "test-model",
            1024,
            Duration::from_secs(5),
            RetryPolicy {
                max_attempts: 2,
                initial_delay_ms: 1,
                multiplier: 2.0,
                max_delay_ms: 2,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_joins_text_blocks() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "sk-test")
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json_body_partial(r#"{"model": "test-model", "system": "sys"}"#);
            then.status(200).json_body(serde_json::json!({
                "content": [
                    {"type": "text", "text": "{\"a\":"},
                    {"type": "text", "text": "1}"}
                ]
            }));
        });

        let text = client(&server.base_url(), Some("sk-test"))
            .complete("sys", "hello")
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(text, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_calling() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200);
        });

        let err = client(&server.base_url(), None)
            .complete("sys", "hello")
            .await
            .unwrap_err();

        assert!(matches!(err, ProcureError::MissingConfigError { .. }));
        api_mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(529).body("overloaded");
        });

        let err = client(&server.base_url(), Some("sk-test"))
            .complete("sys", "hello")
            .await
            .unwrap_err();

        api_mock.assert_hits(2);
        assert!(matches!(err, ProcureError::UpstreamError { status: 529, .. }));
    }
}
