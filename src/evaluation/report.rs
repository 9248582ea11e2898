//! Evaluation report: one row per (engine, metric), with a status derived
//! from a fixed threshold table.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::metrics::{MetricKind, MetricScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pass,
    Fail,
    Low,
    #[serde(rename = "N/A")]
    NotApplicable,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "Pass",
            Status::Fail => "Fail",
            Status::Low => "Low",
            Status::NotApplicable => "N/A",
            Status::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusRule {
    /// Pass when `value >= min`, otherwise `below`.
    AtLeast { min: f64, below: Status },
    /// Pass when `value <= max`, otherwise Fail.
    AtMost { max: f64 },
}

impl StatusRule {
    fn apply(self, value: f64) -> Status {
        match self {
            StatusRule::AtLeast { min, below } => {
                if value >= min {
                    Status::Pass
                } else {
                    below
                }
            }
            StatusRule::AtMost { max } => {
                if value <= max {
                    Status::Pass
                } else {
                    Status::Fail
                }
            }
        }
    }
}

/// Per-metric thresholds used only for the report's Status column.
#[derive(Debug, Clone)]
pub struct StatusTable {
    rules: HashMap<MetricKind, StatusRule>,
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::new(0.4, 0.5)
    }
}

impl StatusTable {
    /// Faithfulness and hallucination rows share the guardrail's thresholds.
    pub fn new(faithfulness_min: f64, hallucination_max: f64) -> Self {
        let rules = HashMap::from([
            (
                MetricKind::Faithfulness,
                StatusRule::AtLeast {
                    min: faithfulness_min,
                    below: Status::Fail,
                },
            ),
            (
                MetricKind::AnswerRelevancy,
                StatusRule::AtLeast {
                    min: 0.7,
                    below: Status::Low,
                },
            ),
            (
                MetricKind::ContextPrecision,
                StatusRule::AtLeast {
                    min: 0.5,
                    below: Status::Low,
                },
            ),
            (
                MetricKind::ContextRecall,
                StatusRule::AtLeast {
                    min: 0.5,
                    below: Status::Low,
                },
            ),
            (
                MetricKind::AnswerCorrectness,
                StatusRule::AtLeast {
                    min: 0.5,
                    below: Status::Low,
                },
            ),
            (
                MetricKind::Hallucination,
                StatusRule::AtMost {
                    max: hallucination_max,
                },
            ),
        ]);
        Self { rules }
    }

    pub fn status(&self, score: &MetricScore, ground_truth_supplied: bool) -> Status {
        if score.is_defaulted() {
            return Status::Error;
        }
        if score.kind == MetricKind::AnswerCorrectness && !ground_truth_supplied {
            return Status::NotApplicable;
        }
        match self.rules.get(&score.kind) {
            Some(rule) => rule.apply(score.value),
            None => Status::NotApplicable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "Engine")]
    pub engine: String,
    #[serde(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Score")]
    pub score: f64,
    #[serde(rename = "Status")]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendFailure {
    pub engine: String,
    pub message: String,
}

/// Built once per query, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    rows: Vec<ReportRow>,
    scores: Vec<MetricScore>,
    failures: Vec<BackendFailure>,
    ground_truth_supplied: bool,
}

impl EvaluationReport {
    /// The report shown when the pipeline fails before evaluation.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder(table: &StatusTable, ground_truth_supplied: bool) -> ReportBuilder<'_> {
        ReportBuilder {
            table,
            ground_truth_supplied,
            scores: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn scores(&self) -> &[MetricScore] {
        &self.scores
    }

    pub fn failures(&self) -> &[BackendFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ground_truth_supplied(&self) -> bool {
        self.ground_truth_supplied
    }

    /// The most conservative score reported for `kind` across all engines.
    pub fn score(&self, kind: MetricKind) -> Option<&MetricScore> {
        let polarity = kind.polarity();
        self.scores
            .iter()
            .filter(|score| score.kind == kind)
            .reduce(|current, candidate| {
                let worst = polarity.most_conservative(current.value, candidate.value);
                if worst == current.value {
                    current
                } else {
                    candidate
                }
            })
    }

    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        self.score(kind).map(|score| score.value)
    }

    /// Plain-text table for terminal output.
    pub fn to_table(&self) -> String {
        if self.rows.is_empty() {
            return "(no evaluation results)\n".to_string();
        }
        let engine_width = self
            .rows
            .iter()
            .map(|row| row.engine.len())
            .max()
            .unwrap_or(0)
            .max("Engine".len());
        let metric_width = self
            .rows
            .iter()
            .map(|row| row.metric.len())
            .max()
            .unwrap_or(0)
            .max("Metric".len());

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<ew$}  {:<mw$}  {:>5}  Status",
            "Engine",
            "Metric",
            "Score",
            ew = engine_width,
            mw = metric_width
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:<ew$}  {:<mw$}  {:>5.2}  {}",
                row.engine,
                row.metric,
                row.score,
                row.status.as_str(),
                ew = engine_width,
                mw = metric_width
            );
        }
        out
    }
}

pub struct ReportBuilder<'a> {
    table: &'a StatusTable,
    ground_truth_supplied: bool,
    scores: Vec<MetricScore>,
    failures: Vec<BackendFailure>,
}

impl ReportBuilder<'_> {
    pub fn push_score(&mut self, score: MetricScore) -> &mut Self {
        self.scores.push(score);
        self
    }

    pub fn record_failure(&mut self, engine: &str, message: impl Into<String>) -> &mut Self {
        self.failures.push(BackendFailure {
            engine: engine.to_string(),
            message: message.into(),
        });
        self
    }

    pub fn build(self) -> EvaluationReport {
        let rows = self
            .scores
            .iter()
            .map(|score| ReportRow {
                engine: score.engine.clone(),
                metric: score.kind.label().to_string(),
                score: round2(score.value),
                status: self.table.status(score, self.ground_truth_supplied),
            })
            .collect();

        EvaluationReport {
            rows,
            scores: self.scores,
            failures: self.failures,
            ground_truth_supplied: self.ground_truth_supplied,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
