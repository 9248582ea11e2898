use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use super::provider::LlmProvider;
use super::types::ChatRequest;

/// Client for any server speaking the OpenAI chat/embeddings API
/// (api.openai.com, LM Studio, vLLM, llama.cpp server).
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.post(url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": false,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let res = self.post("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::backend("chat completion", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::backend(
                "chat completion",
                format!("{}: {}", status, text),
            ));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::backend("chat completion", e))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::backend("chat completion", "response had no message content"))
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self.post("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::backend("embeddings", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::backend("embeddings", format!("{}: {}", status, text)));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::backend("embeddings", e))?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect();
                    embeddings.push(vec);
                }
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(ApiError::backend(
                "embeddings",
                format!("expected {} vectors, got {}", inputs.len(), embeddings.len()),
            ));
        }

        Ok(embeddings)
    }
}
