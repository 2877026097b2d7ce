//! OpenAI-compatible chat-completions backend.
//!
//! Talks to anything serving `POST /v1/chat/completions`: Ollama, LiteLLM
//! proxies, vLLM, hosted APIs. One user message per call, no streaming.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use researchkit_shared::{LlmConfig, ResearchKitError, Result};

use crate::model::LanguageModel;

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("ResearchKit/", env!("CARGO_PKG_VERSION"));

/// HTTP client for an OpenAI-compatible server.
#[derive(Debug, Clone)]
pub struct OpenAiCompatModel {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatModel {
    /// Build from the `[llm]` config section; the API key is read from its env var.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.model,
            config.api_key(),
            config.timeout(),
        )
    }

    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(ResearchKitError::config("model must not be empty"));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ResearchKitError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let mut rb = self.client.post(self.endpoint_chat_completions());
        if let Some(key) = &self.api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| ResearchKitError::Llm(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ResearchKitError::Llm(format!(
                "chat.completions HTTP {status}"
            )));
        }

        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| ResearchKitError::Llm(format!("invalid completion body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ResearchKitError::Llm("completion has no content".into()))?;

        debug!(response_len = content.len(), "completion received");
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
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

    fn model_for(server: &MockServer, api_key: Option<&str>) -> OpenAiCompatModel {
        OpenAiCompatModel::new(
            &server.uri(),
            "gemma2:2b",
            api_key.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn completes_prompt() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gemma2:2b",
                "messages": [{"role": "user", "content": "Say OK"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "OK"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = model_for(&server, None);
        assert_eq!(model.complete("Say OK").await.unwrap(), "OK");
    }

    #[tokio::test]
    async fn sends_bearer_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "hi"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = model_for(&server, Some("sk-test"));
        assert_eq!(model.complete("hello").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn server_error_is_llm_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = model_for(&server, None).complete("hello").await.unwrap_err();
        assert!(matches!(err, ResearchKitError::Llm(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn empty_choices_is_llm_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = model_for(&server, None).complete("hello").await.unwrap_err();
        assert!(err.to_string().contains("no content"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let model = OpenAiCompatModel::new(
            "http://localhost:11434/",
            "m",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            model.endpoint_chat_completions(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = OpenAiCompatModel::new("http://localhost", " ", None, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ResearchKitError::Config { .. }));
    }

    #[test]
    fn from_config_uses_llm_section() {
        let config = LlmConfig {
            base_url: "http://llm.internal:4000".into(),
            model: "llama3.1:8b".into(),
            api_key_env: "RK_TEST_NONEXISTENT_KEY_67890".into(),
            timeout_secs: 10,
        };
        let model = OpenAiCompatModel::from_config(&config).unwrap();
        assert_eq!(model.name(), "llama3.1:8b");
        assert_eq!(model.base_url(), "http://llm.internal:4000");
    }
}
