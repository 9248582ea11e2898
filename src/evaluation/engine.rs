//! Concurrent fan-out over the configured metric backends.
//!
//! Every backend runs under its own timeout. A backend that errors, times
//! out or panics never aborts the query: its metrics are recorded at the
//! conservative default and the failure is kept on the report.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::FutureExt;

use super::backend::{MetricBackend, StatisticalScores};
use super::metrics::{MetricFamily, MetricKind, MetricScore};
use super::report::{EvaluationReport, StatusTable};
use super::sample::EvaluationSample;
use crate::core::errors::{with_timeout, ApiError};

pub struct MetricEngine {
    backends: Vec<MetricBackend>,
    timeout: Duration,
    table: StatusTable,
}

struct BackendRun {
    scores: Vec<MetricScore>,
    failures: Vec<String>,
}

impl MetricEngine {
    /// Fails unless at least one statistical and one model-graded backend
    /// are configured; the guardrail needs both.
    pub fn new(
        backends: Vec<MetricBackend>,
        timeout: Duration,
        table: StatusTable,
    ) -> Result<Self, ApiError> {
        for family in [MetricFamily::Statistical, MetricFamily::ModelGraded] {
            if !backends.iter().any(|backend| backend.family() == family) {
                return Err(ApiError::Configuration(format!(
                    "evaluation requires at least one {:?} metric backend",
                    family
                )));
            }
        }
        Ok(Self {
            backends,
            timeout,
            table,
        })
    }

    pub fn backends(&self) -> &[MetricBackend] {
        &self.backends
    }

    pub async fn evaluate(&self, sample: &EvaluationSample) -> EvaluationReport {
        let runs = join_all(
            self.backends
                .iter()
                .map(|backend| self.run_backend(backend, sample)),
        )
        .await;

        let mut builder = EvaluationReport::builder(&self.table, sample.ground_truth_supplied);
        for (backend, run) in self.backends.iter().zip(runs) {
            for message in run.failures {
                builder.record_failure(backend.name(), message);
            }
            for score in run.scores {
                builder.push_score(score);
            }
        }
        builder.build()
    }

    async fn run_backend(&self, backend: &MetricBackend, sample: &EvaluationSample) -> BackendRun {
        let name = backend.name();
        let started = std::time::Instant::now();

        let result = match backend {
            MetricBackend::Statistical(stat) => {
                let call = with_timeout(name, self.timeout, stat.evaluate(sample));
                match AssertUnwindSafe(call).catch_unwind().await {
                    Ok(Ok(scores)) => Ok(statistical_scores(name, scores)),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(_) => Err(format!("{} panicked", name)),
                }
            }
            MetricBackend::ModelGraded(graded) => {
                let call = with_timeout(
                    name,
                    self.timeout,
                    graded.measure(&sample.question, &sample.answer, &sample.contexts),
                );
                match AssertUnwindSafe(call).catch_unwind().await {
                    Ok(Ok(graded)) => Ok(BackendRun {
                        scores: vec![MetricScore::measured(
                            name,
                            MetricKind::Hallucination,
                            graded.score,
                        )
                        .with_reason(graded.reason)],
                        failures: Vec::new(),
                    }),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(_) => Err(format!("{} panicked", name)),
                }
            }
        };

        match result {
            Ok(run) => {
                tracing::debug!(
                    "Metric backend {} finished in {} ms",
                    name,
                    started.elapsed().as_millis()
                );
                run
            }
            Err(message) => {
                tracing::warn!(
                    "Metric backend {} failed, using conservative defaults: {}",
                    name,
                    message
                );
                BackendRun {
                    scores: backend
                        .kinds()
                        .iter()
                        .map(|&kind| MetricScore::defaulted(name, kind, message.clone()))
                        .collect(),
                    failures: vec![message],
                }
            }
        }
    }
}

/// Unscored metrics are defaulted; each one is also recorded as a failure
/// carrying the backend's own error when it gave one.
fn statistical_scores(engine: &str, mut reported: StatisticalScores) -> BackendRun {
    let mut failures = Vec::new();
    let scores = MetricKind::STATISTICAL
        .iter()
        .map(|&kind| match reported.values.remove(&kind) {
            Some(value) => MetricScore::measured(engine, kind, value),
            None => {
                let error = reported
                    .errors
                    .remove(&kind)
                    .unwrap_or_else(|| format!("{} did not report {}", engine, kind.as_str()));
                failures.push(format!("{}: {}", kind.as_str(), error));
                MetricScore::defaulted(engine, kind, error)
            }
        })
        .collect();
    BackendRun { scores, failures }
}
