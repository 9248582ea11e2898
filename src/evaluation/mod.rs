//! Answer evaluation: metric backends, the concurrent metric engine and the
//! per-query report.
//!
//! - `LexicalMetrics`: offline token-overlap scores
//! - `RagasMetrics`: judge-model verdicts plus embedding similarity
//! - `HallucinationJudge`: model-graded contradiction rate
//! - `suite`: batch evaluation cases and their pass/fail gates

mod backend;
mod engine;
mod hallucination;
mod judge;
mod lexical;
mod metrics;
mod ragas;
mod report;
mod sample;
pub mod suite;

pub use backend::{
    GradedScore, MetricBackend, ModelGradedMetric, StatisticalMetrics, StatisticalScores,
};
pub use engine::MetricEngine;
pub use hallucination::HallucinationJudge;
pub use judge::LlmJudge;
pub use lexical::LexicalMetrics;
pub use metrics::{MetricFamily, MetricKind, MetricScore, Polarity, ScoreOutcome};
pub use ragas::RagasMetrics;
pub use report::{BackendFailure, EvaluationReport, ReportRow, Status, StatusTable};
pub use sample::EvaluationSample;
