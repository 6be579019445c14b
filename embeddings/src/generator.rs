//! Text generation providers.
//!
//! Retrieval itself never generates text. These are consumed by the layers
//! built on top of it (grounded answering in `recall-retrieval`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{GenerationError, GenerationResult};
use crate::provider::check_status;

/// A single prompt for a text generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Optional system instruction.
    pub system: Option<String>,

    /// The user prompt.
    pub prompt: String,

    /// Model override (provider-specific).
    pub model: Option<String>,
}

impl GenerationRequest {
    /// Create a request with just a prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            model: None,
        }
    }

    /// Set the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Trait for text generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Get the name of this generator.
    fn name(&self) -> &str;

    /// Generate a completion for the request.
    async fn generate(&self, request: GenerationRequest) -> GenerationResult<String>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIGenerator {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    default_model: String,
}

impl OpenAIGenerator {
    /// Create a generator reading `OPENAI_API_KEY` from the environment.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            default_model: "gpt-4o-mini".to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

impl Default for OpenAIGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: GenerationRequest) -> GenerationResult<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| GenerationError::NotConfigured {
                provider: self.name().to_string(),
            })?;

        let model = request.model.unwrap_or_else(|| self.default_model.clone());

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt,
        });

        debug!("Requesting chat completion with model: {model}");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "model": model,
                "messages": messages,
            }))
            .send()
            .await?;

        let result: ChatCompletionResponse = check_status(response).await?.json().await?;

        result
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("no choices in response".to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// A generator that answers every prompt with a canned reply and remembers
/// what it was asked.
pub struct MockGenerator {
    reply: String,
    prompts: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    /// Create a generator that always replies with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerationRequest) -> GenerationResult<String> {
        self.prompts.lock().await.push(request);
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_completion_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hello?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "hi" } }]
            })))
            .mount(&server)
            .await;

        let generator = OpenAIGenerator::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());

        let reply = generator
            .generate(GenerationRequest::new("hello?").with_system("be brief"))
            .await
            .unwrap();
        assert_eq!(reply, "hi");
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let generator = OpenAIGenerator::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());

        let err = generator
            .generate(GenerationRequest::new("hello?"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Request(msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn test_missing_key_and_rate_limit_are_generation_errors() {
        let unconfigured = OpenAIGenerator {
            api_key: None,
            ..OpenAIGenerator::new()
        };
        let err = unconfigured
            .generate(GenerationRequest::new("hello?"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured { .. }));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let generator = OpenAIGenerator::new()
            .with_api_key("test-key")
            .with_base_url(server.uri());
        let err = generator
            .generate(GenerationRequest::new("hello?"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::RateLimited {
                retry_after_secs: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_mock_generator_records_requests() {
        let generator = MockGenerator::new("canned");
        let reply = generator
            .generate(GenerationRequest::new("question"))
            .await
            .unwrap();

        assert_eq!(reply, "canned");
        assert_eq!(generator.requests().await, vec![GenerationRequest::new("question")]);
    }
}
