//! Typed view over the merged YAML configuration.
//!
//! `ConfigService` keeps the configuration as a `serde_json::Value` so it can be
//! redacted and patched over HTTP; the pipeline reads it once through
//! `PipelineSettings::from_config` and never touches the raw value again.

use std::env;
use std::time::Duration;

use serde_json::Value;

use super::defaults::{default_config, DEFAULT_GROUND_TRUTH, DEFAULT_METADATA_TOKENS};
use crate::core::errors::ApiError;
use crate::guardrail::GuardrailThresholds;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const MISSING_API_KEY_MESSAGE: &str =
    "Error: OpenAI API key not found. Set OPENAI_API_KEY or llm.api_key in secrets.yaml.";

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub judge_model: String,
    pub embedding_model: String,
    pub api_key: Option<String>,
    pub require_api_key: bool,
    pub temperature: f64,
    pub timeout: Duration,
}

impl LlmSettings {
    /// Credentials are checked before any external call is made.
    pub fn check_credentials(&self) -> Result<(), ApiError> {
        let has_key = self
            .api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);
        if self.require_api_key && !has_key {
            return Err(ApiError::Configuration(MISSING_API_KEY_MESSAGE.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub document_paths: Vec<String>,
    pub k: usize,
    pub fetch_k: usize,
    pub mmr_lambda: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub timeout: Duration,
    pub hashing_embedder: bool,
}

#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    pub backends: Vec<String>,
    pub metric_timeout: Duration,
    pub default_ground_truth: String,
}

#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub program: String,
    pub args: Vec<String>,
    pub spec_path: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
    pub evaluation: EvaluationSettings,
    pub guardrail: GuardrailThresholds,
    pub audit: AuditSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&default_config())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Value) -> Self {
        let llm = section(config, "llm");
        let retrieval = section(config, "retrieval");
        let evaluation = section(config, "evaluation");
        let guardrail = section(config, "guardrail");
        let audit = section(config, "audit");

        let metadata_tokens = string_list(guardrail, "metadata_tokens").unwrap_or_else(|| {
            DEFAULT_METADATA_TOKENS
                .iter()
                .map(|token| token.to_string())
                .collect()
        });

        Self {
            llm: LlmSettings {
                base_url: string_or(llm, "base_url", "https://api.openai.com"),
                model: string_or(llm, "model", "gpt-4o-mini"),
                judge_model: string_or(llm, "judge_model", "gpt-4o-mini"),
                embedding_model: string_or(llm, "embedding_model", "text-embedding-3-small"),
                api_key: llm
                    .and_then(|v| v.get("api_key"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                require_api_key: bool_or(llm, "require_api_key", true),
                temperature: llm
                    .and_then(|v| v.get("temperature"))
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
                timeout: secs_or(llm, "timeout_secs", 60),
            },
            retrieval: RetrievalSettings {
                document_paths: string_list(retrieval, "document_paths").unwrap_or_default(),
                k: u64_or(retrieval, "k", 4) as usize,
                fetch_k: u64_or(retrieval, "fetch_k", 20) as usize,
                mmr_lambda: retrieval
                    .and_then(|v| v.get("mmr_lambda"))
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.5) as f32,
                chunk_size: u64_or(retrieval, "chunk_size", 500) as usize,
                chunk_overlap: u64_or(retrieval, "chunk_overlap", 50) as usize,
                timeout: secs_or(retrieval, "timeout_secs", 30),
                hashing_embedder: bool_or(retrieval, "hashing_embedder", false),
            },
            evaluation: EvaluationSettings {
                backends: string_list(evaluation, "backends").unwrap_or_else(|| {
                    vec!["ragas".to_string(), "hallucination".to_string()]
                }),
                metric_timeout: secs_or(evaluation, "metric_timeout_secs", 120),
                default_ground_truth: string_or(
                    evaluation,
                    "default_ground_truth",
                    DEFAULT_GROUND_TRUTH,
                ),
            },
            guardrail: GuardrailThresholds {
                faithfulness_min: f64_or(guardrail, "faithfulness_min", 0.4),
                hallucination_max: f64_or(guardrail, "hallucination_max", 0.5),
                metadata_tokens,
            },
            audit: AuditSettings {
                program: string_or(audit, "program", "policyqa-eval"),
                args: string_list(audit, "args").unwrap_or_default(),
                spec_path: string_or(audit, "spec_path", "config/audit_suite.yml"),
                timeout: secs_or(audit, "timeout_secs", 300),
            },
        }
    }

    /// Applies process environment overrides (currently the API key).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        self
    }
}

fn section<'a>(config: &'a Value, key: &str) -> Option<&'a Value> {
    config.get(key).filter(|v| v.is_object())
}

fn string_or(section: Option<&Value>, key: &str, default: &str) -> String {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn bool_or(section: Option<&Value>, key: &str, default: bool) -> bool {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

fn u64_or(section: Option<&Value>, key: &str, default: u64) -> u64 {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_u64())
        .unwrap_or(default)
}

fn f64_or(section: Option<&Value>, key: &str, default: f64) -> f64 {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_f64())
        .unwrap_or(default)
}

fn secs_or(section: Option<&Value>, key: &str, default: u64) -> Duration {
    Duration::from_secs(u64_or(section, key, default))
}

fn string_list(section: Option<&Value>, key: &str) -> Option<Vec<String>> {
    let list = section.and_then(|v| v.get(key)).and_then(|v| v.as_array())?;
    Some(
        list.iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_thresholds() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.guardrail.faithfulness_min, 0.4);
        assert_eq!(settings.guardrail.hallucination_max, 0.5);
        assert_eq!(settings.retrieval.k, 4);
        assert_eq!(settings.evaluation.default_ground_truth, DEFAULT_GROUND_TRUTH);
        assert_eq!(settings.audit.timeout, Duration::from_secs(300));
    }

    #[test]
    fn reads_overrides_from_config_value() {
        let config = json!({
            "llm": { "model": "local-model", "require_api_key": false },
            "guardrail": { "faithfulness_min": 0.7, "metadata_tokens": ["SRC::"] },
            "evaluation": { "backends": ["lexical", "hallucination"] }
        });
        let settings = PipelineSettings::from_config(&config);

        assert_eq!(settings.llm.model, "local-model");
        assert!(!settings.llm.require_api_key);
        assert_eq!(settings.guardrail.faithfulness_min, 0.7);
        assert_eq!(settings.guardrail.metadata_tokens, vec!["SRC::".to_string()]);
        assert_eq!(settings.evaluation.backends, vec!["lexical", "hallucination"]);
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let mut settings = PipelineSettings::default();
        settings.llm.api_key = None;
        settings.llm.require_api_key = true;
        assert!(matches!(
            settings.llm.check_credentials(),
            Err(ApiError::Configuration(_))
        ));

        settings.llm.api_key = Some("   ".to_string());
        assert!(settings.llm.check_credentials().is_err());

        settings.llm.require_api_key = false;
        assert!(settings.llm.check_credentials().is_ok());
    }
}
