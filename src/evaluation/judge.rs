use std::sync::Arc;

use serde_json::Value;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict, impartial evaluator of answers produced by a \
     retrieval-augmented policy assistant. Follow the requested JSON schema exactly and respond \
     with a single JSON object and nothing else.";

/// A chat model used as a grader. Always asked for JSON at temperature 0.
#[derive(Clone)]
pub struct LlmJudge {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmJudge {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub async fn ask_json(&self, prompt: String) -> Result<Value, ApiError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(JUDGE_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(0.0)
        .json();

        let raw = self.provider.chat(request, &self.model).await?;
        parse_json_response(&raw).ok_or_else(|| {
            ApiError::backend(
                self.provider.name(),
                format!("judge returned non-JSON output ({} chars)", raw.len()),
            )
        })
    }
}

/// Accepts bare JSON, fenced JSON, or JSON surrounded by prose.
pub fn parse_json_response(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value.is_object().then_some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// Numbered context block shared by the judge prompts.
pub fn format_contexts(contexts: &[String]) -> String {
    if contexts.is_empty() {
        return "(no context retrieved)".to_string();
    }
    contexts
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[Chunk {}]: {}", i, chunk.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Reads `value[key]` as an array of objects and pulls a boolean flag from each.
pub fn bool_flags(value: &Value, key: &str, flag: &str) -> Option<Vec<bool>> {
    let items = value.get(key)?.as_array()?;
    items
        .iter()
        .map(|item| match item.get(flag)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" => Some(true),
                "no" | "false" | "0" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_and_wrapped_json() {
        assert_eq!(parse_json_response(r#"{"a": 1}"#), Some(json!({"a": 1})));
        assert_eq!(
            parse_json_response("```json\n{\"a\": 2}\n```"),
            Some(json!({"a": 2}))
        );
        assert_eq!(
            parse_json_response("Sure! Here you go: {\"a\": 3} hope that helps"),
            Some(json!({"a": 3}))
        );
        assert_eq!(parse_json_response("no json here"), None);
        assert_eq!(parse_json_response("[1, 2]"), None);
    }

    #[test]
    fn bool_flags_accept_yes_no_strings() {
        let value = json!({
            "verdicts": [
                {"verdict": "yes"},
                {"verdict": false},
                {"verdict": "No"},
            ]
        });
        assert_eq!(
            bool_flags(&value, "verdicts", "verdict"),
            Some(vec![true, false, false])
        );

        let malformed = json!({"verdicts": [{"verdict": "maybe"}]});
        assert_eq!(bool_flags(&malformed, "verdicts", "verdict"), None);
        assert_eq!(bool_flags(&json!({}), "verdicts", "verdict"), None);
    }

    #[test]
    fn contexts_are_numbered_from_zero() {
        let block = format_contexts(&["first".into(), " second ".into()]);
        assert_eq!(block, "[Chunk 0]: first\n\n[Chunk 1]: second");
        assert_eq!(format_contexts(&[]), "(no context retrieved)");
    }
}
