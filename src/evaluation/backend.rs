//! Metric backend traits.
//!
//! Two families: statistical evaluators score a whole `EvaluationSample`
//! in one call, model-graded evaluators return a single hallucination score
//! with a free-text reason.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::metrics::{MetricFamily, MetricKind};
use super::sample::EvaluationSample;
use crate::core::errors::ApiError;

/// What a statistical backend managed to score. A metric absent from
/// `values` is defaulted by the engine, with its `errors` entry as the cause
/// when there is one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticalScores {
    pub values: HashMap<MetricKind, f64>,
    pub errors: HashMap<MetricKind, String>,
}

impl StatisticalScores {
    pub fn fail(&mut self, kind: MetricKind, error: impl Into<String>) {
        self.errors.insert(kind, error.into());
    }
}

impl From<HashMap<MetricKind, f64>> for StatisticalScores {
    fn from(values: HashMap<MetricKind, f64>) -> Self {
        Self {
            values,
            errors: HashMap::new(),
        }
    }
}

#[async_trait]
pub trait StatisticalMetrics: Send + Sync {
    fn name(&self) -> &str;

    /// `Err` only when nothing could be scored.
    async fn evaluate(&self, sample: &EvaluationSample) -> Result<StatisticalScores, ApiError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradedScore {
    /// Fraction of contexts contradicted by the answer; higher is worse.
    pub score: f64,
    pub reason: String,
}

#[async_trait]
pub trait ModelGradedMetric: Send + Sync {
    fn name(&self) -> &str;

    async fn measure(
        &self,
        question: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<GradedScore, ApiError>;
}

#[derive(Clone)]
pub enum MetricBackend {
    Statistical(Arc<dyn StatisticalMetrics>),
    ModelGraded(Arc<dyn ModelGradedMetric>),
}

impl MetricBackend {
    pub fn name(&self) -> &str {
        match self {
            MetricBackend::Statistical(backend) => backend.name(),
            MetricBackend::ModelGraded(backend) => backend.name(),
        }
    }

    pub fn family(&self) -> MetricFamily {
        match self {
            MetricBackend::Statistical(_) => MetricFamily::Statistical,
            MetricBackend::ModelGraded(_) => MetricFamily::ModelGraded,
        }
    }

    /// Metrics this backend is expected to report.
    pub fn kinds(&self) -> &'static [MetricKind] {
        match self {
            MetricBackend::Statistical(_) => &MetricKind::STATISTICAL,
            MetricBackend::ModelGraded(_) => &[MetricKind::Hallucination],
        }
    }
}

impl std::fmt::Debug for MetricBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricBackend")
            .field("name", &self.name())
            .field("family", &self.family())
            .finish()
    }
}
