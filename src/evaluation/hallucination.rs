//! Model-graded hallucination metric.
//!
//! The judge reads each retrieved context and says whether the answer agrees
//! with it. The score is the share of contexts the answer contradicts, so
//! 0.0 means fully consistent and 1.0 means every context was contradicted.

use async_trait::async_trait;
use serde_json::Value;

use super::backend::{GradedScore, ModelGradedMetric};
use super::judge::{format_contexts, LlmJudge};
use crate::core::errors::ApiError;

pub struct HallucinationJudge {
    judge: LlmJudge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextVerdict {
    pub agrees: bool,
    pub reason: Option<String>,
}

impl HallucinationJudge {
    pub fn new(judge: LlmJudge) -> Self {
        Self { judge }
    }

    fn prompt(question: &str, answer: &str, contexts: &[String]) -> String {
        format!(
            r#"For each CONTEXT chunk, decide whether the ACTUAL OUTPUT agrees with it.
Answer "yes" if the output is consistent with the chunk or does not address it, and "no" only if the output contradicts the chunk. When the verdict is "no", give a one-sentence reason quoting the contradicted fact.

INPUT:
{question}

ACTUAL OUTPUT:
{answer}

CONTEXT:
{context}

Respond in JSON with exactly one verdict per chunk, in order:
{{
  "verdicts": [
    {{"verdict": "yes"}},
    {{"verdict": "no", "reason": "..."}}
  ]
}}"#,
            question = question,
            answer = answer,
            context = format_contexts(contexts)
        )
    }
}

#[async_trait]
impl ModelGradedMetric for HallucinationJudge {
    fn name(&self) -> &str {
        "hallucination"
    }

    async fn measure(
        &self,
        question: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<GradedScore, ApiError> {
        if contexts.is_empty() {
            return Err(ApiError::BadRequest(
                "hallucination check needs at least one retrieved context".to_string(),
            ));
        }

        let response = self
            .judge
            .ask_json(Self::prompt(question, answer, contexts))
            .await?;
        let verdicts = parse_verdicts(&response).ok_or_else(|| {
            ApiError::backend(self.judge.name(), "hallucination verdicts are malformed")
        })?;
        if verdicts.len() != contexts.len() {
            tracing::debug!(
                "hallucination judge returned {} verdicts for {} contexts",
                verdicts.len(),
                contexts.len()
            );
        }

        Ok(score_verdicts(&verdicts, contexts.len()))
    }
}

pub fn parse_verdicts(value: &Value) -> Option<Vec<ContextVerdict>> {
    value
        .get("verdicts")?
        .as_array()?
        .iter()
        .map(|item| {
            let agrees = match item.get("verdict")? {
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "yes" => true,
                    "no" => false,
                    _ => return None,
                },
                Value::Bool(b) => *b,
                _ => return None,
            };
            let reason = item
                .get("reason")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
            Some(ContextVerdict { agrees, reason })
        })
        .collect()
}

/// Missing verdicts count as contradictions.
pub fn score_verdicts(verdicts: &[ContextVerdict], expected: usize) -> GradedScore {
    let total = expected.max(verdicts.len()).max(1);
    let agreeing = verdicts.iter().take(total).filter(|v| v.agrees).count();
    let contradicted = total - agreeing;
    let score = contradicted as f64 / total as f64;

    let reasons: Vec<&str> = verdicts
        .iter()
        .filter(|v| !v.agrees)
        .filter_map(|v| v.reason.as_deref())
        .collect();

    let reason = if contradicted == 0 {
        format!(
            "The score is {:.2} because the output agrees with all {} retrieved contexts.",
            score, total
        )
    } else if reasons.is_empty() {
        format!(
            "The score is {:.2} because the output contradicts {} of {} retrieved contexts.",
            score, contradicted, total
        )
    } else {
        format!(
            "The score is {:.2} because the output contradicts {} of {} retrieved contexts: {}",
            score,
            contradicted,
            total,
            reasons.join(" ")
        )
    };

    GradedScore { score, reason }
}
