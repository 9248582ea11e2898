//! Judge-based statistical backend.
//!
//! Faithfulness, context precision, context recall and the factual part of
//! answer correctness are graded by a chat model returning per-item verdicts;
//! the scores are computed here from those verdicts rather than trusted from
//! the model. Answer relevancy and the semantic part of correctness come from
//! embedding similarity.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::backend::{StatisticalMetrics, StatisticalScores};
use super::judge::{bool_flags, format_contexts, LlmJudge};
use super::lexical::average_precision;
use super::metrics::MetricKind;
use super::sample::EvaluationSample;
use crate::core::errors::ApiError;
use crate::llm::Embedder;
use crate::vector_math::cosine_similarity;

const FACTUAL_WEIGHT: f64 = 0.75;
const SEMANTIC_WEIGHT: f64 = 0.25;

pub struct RagasMetrics {
    judge: LlmJudge,
    embedder: Arc<dyn Embedder>,
}

impl RagasMetrics {
    pub fn new(judge: LlmJudge, embedder: Arc<dyn Embedder>) -> Self {
        Self { judge, embedder }
    }

    fn faithfulness_prompt(answer: &str, contexts: &[String]) -> String {
        format!(
            r#"Break the ANSWER into atomic factual claims and decide whether each claim can be inferred from the CONTEXT alone.

CONTEXT:
{context}

ANSWER:
{answer}

Respond in JSON:
{{
  "claims": [
    {{"claim": "...", "supported": true}},
    {{"claim": "...", "supported": false}}
  ]
}}"#,
            context = format_contexts(contexts),
            answer = answer
        )
    }

    fn precision_prompt(question: &str, reference: &str, contexts: &[String]) -> String {
        format!(
            r#"For each retrieved chunk, decide whether it was useful for arriving at the REFERENCE answer to the QUESTION.

QUESTION:
{question}

REFERENCE:
{reference}

RETRIEVED CONTEXT (in rank order):
{context}

Respond in JSON with one entry per chunk, in order:
{{
  "verdicts": [
    {{"chunk_index": 0, "useful": true}}
  ]
}}"#,
            question = question,
            reference = reference,
            context = format_contexts(contexts)
        )
    }

    fn recall_prompt(reference: &str, contexts: &[String]) -> String {
        format!(
            r#"Split the REFERENCE into individual statements and decide whether each statement can be attributed to the CONTEXT.

CONTEXT:
{context}

REFERENCE:
{reference}

Respond in JSON:
{{
  "statements": [
    {{"statement": "...", "attributed": true}}
  ]
}}"#,
            context = format_contexts(contexts),
            reference = reference
        )
    }

    fn correctness_prompt(question: &str, answer: &str, reference: &str) -> String {
        format!(
            r#"Compare the ANSWER with the REFERENCE for the QUESTION. Classify statements as:
- "tp": statements in the answer that are supported by the reference
- "fp": statements in the answer not supported by the reference
- "fn": statements in the reference missing from the answer

QUESTION:
{question}

ANSWER:
{answer}

REFERENCE:
{reference}

Respond in JSON:
{{"tp": ["..."], "fp": ["..."], "fn": ["..."]}}"#,
            question = question,
            answer = answer,
            reference = reference
        )
    }

    async fn faithfulness(&self, sample: &EvaluationSample) -> Result<f64, ApiError> {
        let verdict = self
            .judge
            .ask_json(Self::faithfulness_prompt(&sample.answer, &sample.contexts))
            .await?;
        let flags = self.flags(&verdict, "claims", "supported")?;
        Ok(fraction_true(&flags))
    }

    async fn context_precision(&self, sample: &EvaluationSample) -> Result<f64, ApiError> {
        if sample.contexts.is_empty() {
            return Ok(0.0);
        }
        let verdict = self
            .judge
            .ask_json(Self::precision_prompt(
                &sample.question,
                &sample.ground_truth,
                &sample.contexts,
            ))
            .await?;
        let mut flags = self.flags(&verdict, "verdicts", "useful")?;
        flags.resize(sample.contexts.len(), false);
        Ok(average_precision(&flags))
    }

    async fn context_recall(&self, sample: &EvaluationSample) -> Result<f64, ApiError> {
        let verdict = self
            .judge
            .ask_json(Self::recall_prompt(&sample.ground_truth, &sample.contexts))
            .await?;
        let flags = self.flags(&verdict, "statements", "attributed")?;
        Ok(fraction_true(&flags))
    }

    async fn answer_relevancy(&self, sample: &EvaluationSample) -> Result<f64, ApiError> {
        self.similarity(&sample.question, &sample.answer).await
    }

    async fn answer_correctness(&self, sample: &EvaluationSample) -> Result<f64, ApiError> {
        let (classified, semantic) = tokio::try_join!(
            self.judge.ask_json(Self::correctness_prompt(
                &sample.question,
                &sample.answer,
                &sample.ground_truth
            )),
            self.similarity(&sample.answer, &sample.ground_truth),
        )?;
        let count = |key: &str| {
            classified
                .get(key)
                .and_then(Value::as_array)
                .map(Vec::len)
                .ok_or_else(|| {
                    ApiError::backend(self.name(), format!("correctness verdict is missing '{}'", key))
                })
        };
        let f1 = factual_f1(count("tp")?, count("fp")?, count("fn")?);
        Ok(FACTUAL_WEIGHT * f1 + SEMANTIC_WEIGHT * semantic)
    }

    async fn similarity(&self, left: &str, right: &str) -> Result<f64, ApiError> {
        if left.trim().is_empty() || right.trim().is_empty() {
            return Ok(0.0);
        }
        let vectors = self
            .embedder
            .embed(&[left.to_string(), right.to_string()])
            .await?;
        match vectors.as_slice() {
            [a, b] => Ok(cosine_similarity(a, b)?.clamp(0.0, 1.0) as f64),
            _ => Err(ApiError::backend(
                self.embedder.name(),
                format!("expected 2 embeddings, got {}", vectors.len()),
            )),
        }
    }

    fn flags(&self, verdict: &Value, key: &str, flag: &str) -> Result<Vec<bool>, ApiError> {
        bool_flags(verdict, key, flag).ok_or_else(|| {
            ApiError::backend(
                self.name(),
                format!("verdict is missing '{}[].{}'", key, flag),
            )
        })
    }
}

#[async_trait]
impl StatisticalMetrics for RagasMetrics {
    fn name(&self) -> &str {
        "ragas"
    }

    async fn evaluate(&self, sample: &EvaluationSample) -> Result<StatisticalScores, ApiError> {
        let (faithfulness, relevancy, precision, recall, correctness) = tokio::join!(
            self.faithfulness(sample),
            self.answer_relevancy(sample),
            self.context_precision(sample),
            self.context_recall(sample),
            self.answer_correctness(sample),
        );

        let mut scores = StatisticalScores::default();
        let mut first_error = None;
        for (kind, result) in [
            (MetricKind::Faithfulness, faithfulness),
            (MetricKind::AnswerRelevancy, relevancy),
            (MetricKind::ContextPrecision, precision),
            (MetricKind::ContextRecall, recall),
            (MetricKind::AnswerCorrectness, correctness),
        ] {
            match result {
                Ok(value) => {
                    scores.values.insert(kind, value);
                }
                Err(err) => {
                    tracing::warn!("ragas {} failed: {}", kind.as_str(), err);
                    scores.fail(kind, err.to_string());
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if scores.values.is_empty() => Err(err),
            _ => Ok(scores),
        }
    }
}

fn fraction_true(flags: &[bool]) -> f64 {
    if flags.is_empty() {
        return 0.0;
    }
    flags.iter().filter(|f| **f).count() as f64 / flags.len() as f64
}

/// F1 over classified statements: tp / (tp + (fp + fn) / 2).
pub fn factual_f1(tp: usize, fp: usize, fn_: usize) -> f64 {
    let denom = tp as f64 + 0.5 * (fp + fn_) as f64;
    if denom == 0.0 {
        0.0
    } else {
        tp as f64 / denom
    }
}
