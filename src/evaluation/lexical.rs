//! Offline statistical backend built on content-token overlap.
//!
//! Deterministic and network-free; useful when no judge model is reachable
//! and as a second, cheaper opinion next to the judge-based backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::backend::{StatisticalMetrics, StatisticalScores};
use super::metrics::MetricKind;
use super::sample::EvaluationSample;
use crate::core::errors::ApiError;
use crate::text::{content_token_set, content_tokens, sentences};

/// Share of a claim's content tokens that must appear in the context.
const SUPPORT_THRESHOLD: f64 = 0.6;
/// Share of the reference's tokens a chunk must cover to count as useful.
const RELEVANCE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Default, Clone)]
pub struct LexicalMetrics;

impl LexicalMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, sample: &EvaluationSample) -> HashMap<MetricKind, f64> {
        HashMap::from([
            (
                MetricKind::Faithfulness,
                faithfulness(&sample.answer, &sample.contexts),
            ),
            (
                MetricKind::AnswerRelevancy,
                answer_relevancy(&sample.question, &sample.answer),
            ),
            (
                MetricKind::ContextPrecision,
                context_precision(&sample.ground_truth, &sample.contexts),
            ),
            (
                MetricKind::ContextRecall,
                context_recall(&sample.ground_truth, &sample.contexts),
            ),
            (
                MetricKind::AnswerCorrectness,
                answer_correctness(&sample.answer, &sample.ground_truth),
            ),
        ])
    }
}

#[async_trait]
impl StatisticalMetrics for LexicalMetrics {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn evaluate(&self, sample: &EvaluationSample) -> Result<StatisticalScores, ApiError> {
        Ok(self.score(sample).into())
    }
}

/// Fraction of `tokens` present in `pool`; `None` when there is nothing to check.
fn coverage(tokens: &HashSet<String>, pool: &HashSet<String>) -> Option<f64> {
    if tokens.is_empty() {
        return None;
    }
    let hits = tokens.iter().filter(|t| pool.contains(*t)).count();
    Some(hits as f64 / tokens.len() as f64)
}

fn union_tokens(texts: &[String]) -> HashSet<String> {
    texts.iter().flat_map(|text| content_tokens(text)).collect()
}

/// Fraction of answer sentences whose content is attributable to the contexts.
pub fn faithfulness(answer: &str, contexts: &[String]) -> f64 {
    supported_fraction(answer, &union_tokens(contexts))
}

fn supported_fraction(text: &str, pool: &HashSet<String>) -> f64 {
    let claims: Vec<HashSet<String>> = sentences(text)
        .iter()
        .map(|s| content_token_set(s))
        .filter(|tokens| !tokens.is_empty())
        .collect();
    if claims.is_empty() {
        return 0.0;
    }
    let supported = claims
        .iter()
        .filter(|claim| coverage(claim, pool).unwrap_or(0.0) >= SUPPORT_THRESHOLD)
        .count();
    supported as f64 / claims.len() as f64
}

/// Share of the question's content tokens that the answer addresses.
pub fn answer_relevancy(question: &str, answer: &str) -> f64 {
    coverage(&content_token_set(question), &content_token_set(answer)).unwrap_or(0.0)
}

/// Rank-weighted average precision of the retrieved chunks against the reference.
pub fn context_precision(reference: &str, contexts: &[String]) -> f64 {
    let reference_tokens = content_token_set(reference);
    let relevant: Vec<bool> = contexts
        .iter()
        .map(|chunk| {
            coverage(&reference_tokens, &content_token_set(chunk)).unwrap_or(0.0)
                >= RELEVANCE_THRESHOLD
        })
        .collect();
    average_precision(&relevant)
}

/// Mean of precision@k over the ranks holding a relevant item.
pub fn average_precision(relevant: &[bool]) -> f64 {
    let mut hits = 0usize;
    let mut total = 0.0;
    for (rank, &is_relevant) in relevant.iter().enumerate() {
        if is_relevant {
            hits += 1;
            total += hits as f64 / (rank + 1) as f64;
        }
    }
    if hits == 0 {
        0.0
    } else {
        total / hits as f64
    }
}

/// Fraction of reference sentences attributable to the retrieved contexts.
pub fn context_recall(reference: &str, contexts: &[String]) -> f64 {
    supported_fraction(reference, &union_tokens(contexts))
}

/// Token-set F1 between answer and reference.
pub fn answer_correctness(answer: &str, reference: &str) -> f64 {
    let answer_tokens = content_token_set(answer);
    let reference_tokens = content_token_set(reference);
    if answer_tokens.is_empty() || reference_tokens.is_empty() {
        return 0.0;
    }
    let overlap = answer_tokens.intersection(&reference_tokens).count() as f64;
    if overlap == 0.0 {
        return 0.0;
    }
    let precision = overlap / answer_tokens.len() as f64;
    let recall = overlap / reference_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}
