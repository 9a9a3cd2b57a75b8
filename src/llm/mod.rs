//! LLM collaborator interface.
//!
//! The pipeline talks to language models only through [`LlmClient`]: a
//! prompt plus a JSON schema in, a JSON value plus cost out. Typed
//! validation of the value is the caller's job.

mod budget;
mod openai;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PipelineResult;

pub use budget::{Budget, MeteredLlm};
pub use openai::OpenAiClient;

/// Named JSON schema the response must follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Schema name sent to the provider.
    pub name: String,
    /// The JSON schema.
    pub schema: Value,
}

/// A structured completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instructions.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Expected output shape.
    pub schema: OutputSchema,
}

/// Token usage of one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    pub prompt_tokens: u64,
    /// Completion tokens.
    pub completion_tokens: u64,
}

/// A structured completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// The parsed JSON value.
    pub value: Value,
    /// Token usage.
    pub usage: Usage,
    /// USD cost of the call.
    pub cost: Decimal,
}

/// A language model that returns JSON conforming to a requested schema.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Runs one completion.
    ///
    /// Fails with `SchemaValidation` when the response is not JSON and with
    /// `Provider` when the service fails.
    async fn complete(&self, request: &CompletionRequest) -> PipelineResult<Completion>;

    /// Model identifier for logs.
    fn model(&self) -> &str;
}
