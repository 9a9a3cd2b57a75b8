//! OpenAI-compatible chat completion client.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::LlmSettings;
use crate::error::{PipelineError, PipelineResult};
use crate::retry::{RetryPolicy, with_backoff};

use super::{Completion, CompletionRequest, LlmClient, Usage};

const PROVIDER: &str = "openai";

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: ApiUsage,
}

/// Chat completions client with structured output and retry.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    input_cost_per_1k: Decimal,
    output_cost_per_1k: Decimal,
    retry: RetryPolicy,
}

impl OpenAiClient {
    /// Creates a client from settings and an API key.
    pub fn new(settings: &LlmSettings, api_key: String, retry: RetryPolicy) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PipelineError::provider(PROVIDER, e.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            input_cost_per_1k: settings.input_cost_per_1k,
            output_cost_per_1k: settings.output_cost_per_1k,
            retry,
        })
    }

    /// USD cost of a call with the given usage.
    pub fn cost_of(&self, usage: Usage) -> Decimal {
        let thousand = Decimal::from(1000);
        Decimal::from(usage.prompt_tokens) * self.input_cost_per_1k / thousand
            + Decimal::from(usage.completion_tokens) * self.output_cost_per_1k / thousand
    }

    async fn call_once(&self, request: &CompletionRequest) -> PipelineResult<Completion> {
        let body = json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": &request.system},
                {"role": "user", "content": &request.prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": &request.schema.name,
                    "schema": &request.schema.schema
                }
            }
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::provider(PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::provider(
                PROVIDER,
                format!("HTTP {}: {}", status, text),
            ));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::provider(PROVIDER, e.to_string()))?;
        let usage = Usage {
            prompt_tokens: api_response.usage.prompt_tokens,
            completion_tokens: api_response.usage.completion_tokens,
        };
        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::provider(PROVIDER, "response has no content"))?;

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| PipelineError::schema(request.schema.name.as_str(), e.to_string()))?;

        Ok(Completion {
            value,
            usage,
            cost: self.cost_of(usage),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, schema = %request.schema.name))]
    async fn complete(&self, request: &CompletionRequest) -> PipelineResult<Completion> {
        let completion = with_backoff(&self.retry, "chat_completion", move || {
            self.call_once(request)
        })
        .await?;
        debug!(
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            cost = %completion.cost,
            "Completion received"
        );
        Ok(completion)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::OutputSchema;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> LlmSettings {
        LlmSettings {
            base_url: base_url.to_string(),
            model: "gpt-test".to_string(),
            api_key_env: "UNUSED".to_string(),
            timeout_secs: 5,
            max_tokens: 500,
            temperature: 0.0,
            input_cost_per_1k: Decimal::new(1, 2),
            output_cost_per_1k: Decimal::new(2, 2),
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "system".to_string(),
            prompt: "prompt".to_string(),
            schema: OutputSchema {
                name: "ordinary_hours".to_string(),
                schema: json!({"type": "object"}),
            },
        }
    }

    fn completion_body(content: &str) -> Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 500}
        })
    }

    #[tokio::test]
    async fn test_complete_parses_json_and_costs_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body(r#"{"entries": []}"#)),
            )
            .mount(&server)
            .await;

        let client = OpenAiClient::new(
            &settings(&server.uri()),
            "sk-test".to_string(),
            RetryPolicy::immediate(1),
        )
        .unwrap();
        let completion = client.complete(&request()).await.unwrap();
        assert_eq!(completion.value, json!({"entries": []}));
        // 1000 * 0.01 / 1000 + 500 * 0.02 / 1000
        assert_eq!(completion.cost, Decimal::new(2, 2));
    }

    #[tokio::test]
    async fn test_non_json_content_is_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("not json")))
            .mount(&server)
            .await;

        let client =
            OpenAiClient::new(&settings(&server.uri()), "k".to_string(), RetryPolicy::immediate(3))
                .unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.reason_code(), "schema_invalid");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_surface_as_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        let client =
            OpenAiClient::new(&settings(&server.uri()), "k".to_string(), RetryPolicy::immediate(2))
                .unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err.reason_code(), "provider_failed");
    }
}
