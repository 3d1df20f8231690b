//! OpenAI-compatible chat completions client

use super::{ChatMessage, ChatModel, Platform};
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in error messages
const ERROR_BODY_EXCERPT: usize = 300;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        config: &LlmConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Client for a platform, with the API key taken from the environment
    pub fn for_platform(platform: Platform, config: &LlmConfig) -> Result<Self> {
        Self::with_api_key(platform, config, env(platform.api_key_env()))
    }

    fn with_api_key(
        platform: Platform,
        config: &LlmConfig,
        api_key: Option<String>,
    ) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::MissingApiKey(platform.api_key_env().to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| platform.default_base_url().to_string());
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| platform.default_model().to_string());

        Self::new(base_url, api_key, model, config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        debug!("Sending {} messages to {}", messages.len(), self.model);

        let resp = self
            .client
            .post(self.endpoint_chat_completions())
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(format!(
                "{} returned HTTP {}",
                self.model, status
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(Error::Llm(format!(
                "chat.completions HTTP {}: {}",
                status, excerpt
            )));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm("chat.completions response has no content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            format!("{}/v1", server.uri()),
            "sk-test",
            "llama3-8b-8192",
            &LlmConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3-8b-8192",
                "stream": false,
                "messages": [{"role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = client(&server)
            .complete(&[ChatMessage::user("Hello")])
            .await
            .unwrap();
        assert_eq!(answer, "Hi there");
    }

    #[tokio::test]
    async fn test_rate_limit_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&[ChatMessage::user("Hello")])
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_server_error_and_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let llm = client(&server);

        let err = llm.complete(&[ChatMessage::user("a")]).await.unwrap_err();
        match err {
            Error::Llm(msg) => assert!(msg.contains("500") && msg.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }

        let err = llm.complete(&[ChatMessage::user("a")]).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }

    #[test]
    fn test_missing_api_key() {
        let config = LlmConfig::default();
        let err = OpenAiCompatClient::with_api_key(Platform::Groq, &config, None).unwrap_err();
        assert!(matches!(err, Error::MissingApiKey(ref var) if var == "GROQ_API_KEY"));

        let err = OpenAiCompatClient::with_api_key(Platform::OpenAi, &config, Some("  ".into()))
            .unwrap_err();
        assert!(matches!(err, Error::MissingApiKey(_)));
    }

    #[test]
    fn test_platform_defaults_and_overrides() {
        let mut config = LlmConfig::default();
        let groq =
            OpenAiCompatClient::with_api_key(Platform::Groq, &config, Some("k".into())).unwrap();
        assert_eq!(groq.base_url(), "https://api.groq.com/openai/v1");
        assert_eq!(groq.model_name(), "llama3-8b-8192");

        config.base_url = Some("http://localhost:8080/v1".to_string());
        config.model = Some("local-model".to_string());
        let local =
            OpenAiCompatClient::with_api_key(Platform::OpenAi, &config, Some("k".into())).unwrap();
        assert_eq!(local.base_url(), "http://localhost:8080/v1");
        assert_eq!(local.model_name(), "local-model");
        assert_eq!(
            local.endpoint_chat_completions(),
            "http://localhost:8080/v1/chat/completions"
        );
    }
}
