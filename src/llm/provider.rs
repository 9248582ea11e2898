use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// An OpenAI-compatible endpoint: chat for generation and judging,
/// embeddings for retrieval and answer similarity.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Non-streaming chat completion; returns the message content.
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError>;

    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}
