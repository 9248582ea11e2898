//! Release/block decision over a finished evaluation report.
//!
//! Rules are checked in a fixed order and the first one that fires wins:
//! structural output, then faithfulness, then hallucination. Reasons are
//! safe to show to users and never quote the blocked answer.

use serde::{Deserialize, Serialize};

use super::rules::{StructuralFinding, StructuralScanner};
use crate::core::config::defaults::DEFAULT_METADATA_TOKENS;
use crate::evaluation::{EvaluationReport, MetricKind};

#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailThresholds {
    /// BLOCK when faithfulness is strictly below this value.
    pub faithfulness_min: f64,
    /// BLOCK when the hallucination (contradiction) score is strictly above this value.
    pub hallucination_max: f64,
    pub metadata_tokens: Vec<String>,
}

impl Default for GuardrailThresholds {
    fn default() -> Self {
        Self {
            faithfulness_min: 0.4,
            hallucination_max: 0.5,
            metadata_tokens: DEFAULT_METADATA_TOKENS
                .iter()
                .map(|token| token.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Release,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeringRule {
    Structural,
    Faithfulness,
    Hallucination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailDecision {
    pub verdict: Verdict,
    pub reason: String,
    pub triggering_rule: Option<TriggeringRule>,
}

impl GuardrailDecision {
    fn release() -> Self {
        Self {
            verdict: Verdict::Release,
            reason: "All guardrail checks passed.".to_string(),
            triggering_rule: None,
        }
    }

    fn block(rule: TriggeringRule, reason: String) -> Self {
        Self {
            verdict: Verdict::Block,
            reason,
            triggering_rule: Some(rule),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Block
    }

    /// What the caller sees in place of a blocked answer.
    pub fn block_message(&self) -> String {
        format!("Response blocked by guardrail: {}", self.reason)
    }
}

pub struct Guardrail {
    thresholds: GuardrailThresholds,
    scanner: StructuralScanner,
}

impl Guardrail {
    pub fn new(thresholds: GuardrailThresholds) -> Self {
        let scanner = StructuralScanner::new(thresholds.metadata_tokens.clone());
        Self {
            thresholds,
            scanner,
        }
    }

    pub fn thresholds(&self) -> &GuardrailThresholds {
        &self.thresholds
    }

    /// Pure function of the answer text and the report.
    pub fn decide(&self, answer: &str, report: &EvaluationReport) -> GuardrailDecision {
        if let Some(finding) = self.scanner.scan(answer) {
            if let StructuralFinding::MetadataToken(token) = &finding {
                tracing::debug!("Structural check matched metadata token {:?}", token);
            }
            return GuardrailDecision::block(
                TriggeringRule::Structural,
                format!("unauthorized output format ({}).", finding.label()),
            );
        }

        let faithfulness = report
            .value(MetricKind::Faithfulness)
            .unwrap_or_else(|| MetricKind::Faithfulness.polarity().conservative_default());
        if faithfulness < self.thresholds.faithfulness_min {
            return GuardrailDecision::block(
                TriggeringRule::Faithfulness,
                format!(
                    "the answer failed the faithfulness/grounding check (faithfulness {:.2} is below {:.2}).",
                    faithfulness, self.thresholds.faithfulness_min
                ),
            );
        }

        let hallucination = report.score(MetricKind::Hallucination);
        let hallucination_value = hallucination
            .map(|score| score.value)
            .unwrap_or_else(|| MetricKind::Hallucination.polarity().conservative_default());
        if hallucination_value > self.thresholds.hallucination_max {
            let detail = hallucination
                .and_then(|score| score.reason.clone())
                .unwrap_or_else(|| "no hallucination verdict was available".to_string());
            return GuardrailDecision::block(
                TriggeringRule::Hallucination,
                format!(
                    "the answer failed the hallucination check (score {:.2} exceeds {:.2}). {}",
                    hallucination_value, self.thresholds.hallucination_max, detail
                ),
            );
        }

        GuardrailDecision::release()
    }
}
