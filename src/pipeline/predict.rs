//! One query, end to end: retrieve, generate, split, evaluate, decide.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;
use serde::Serialize;

use super::context::PipelineContext;
use super::splitter::{split_response, SplitResponse};
use crate::core::errors::{with_timeout, ApiError};
use crate::evaluation::{EvaluationReport, EvaluationSample};
use crate::guardrail::GuardrailDecision;
use crate::rag::RetrievedContext;

pub const EMPTY_QUESTION_MESSAGE: &str = "Please enter a policy question.";

/// What the caller gets back. `decision` is `None` when the pipeline
/// failed before the guardrail ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictOutcome {
    pub final_answer: String,
    pub report: EvaluationReport,
    pub decision: Option<GuardrailDecision>,
}

/// Everything one successful query produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub question: String,
    pub context: RetrievedContext,
    pub response: SplitResponse,
    pub report: EvaluationReport,
    pub decision: GuardrailDecision,
    pub elapsed_ms: u64,
}

impl PipelineRun {
    /// The released answer, or the block message in its place.
    pub fn final_answer(&self) -> String {
        if self.decision.is_blocked() {
            self.decision.block_message()
        } else {
            self.response.answer.clone()
        }
    }

    pub fn into_outcome(self) -> PredictOutcome {
        PredictOutcome {
            final_answer: self.final_answer(),
            report: self.report,
            decision: Some(self.decision),
        }
    }
}

/// Runs the pipeline and surfaces failures as errors. Metric backend
/// failures are not errors; they are folded into the report.
pub async fn run_query(
    ctx: &PipelineContext,
    question: &str,
    ground_truth: Option<&str>,
) -> Result<PipelineRun, ApiError> {
    let started = Instant::now();
    let question = question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest(EMPTY_QUESTION_MESSAGE.to_string()));
    }

    let settings = ctx.settings();
    settings.llm.check_credentials()?;

    let passages = with_timeout(
        "retrieval",
        settings.retrieval.timeout,
        ctx.store().search(question, settings.retrieval.k),
    )
    .await?;
    let context = RetrievedContext::new(passages);
    let texts = context.texts();
    tracing::debug!("Retrieved {} passages", context.len());

    let raw = with_timeout(
        "generation",
        settings.llm.timeout,
        ctx.generator().generate(question, &texts),
    )
    .await?;
    let response = split_response(&raw);

    let sample = EvaluationSample::new(
        question,
        response.answer.clone(),
        texts,
        ground_truth,
        &settings.evaluation.default_ground_truth,
    );
    let report = ctx.metrics().evaluate(&sample).await;
    let decision = ctx.guardrail().decide(&response.answer, &report);

    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        verdict = ?decision.verdict,
        rule = ?decision.triggering_rule,
        failed_backends = report.failures().len(),
        elapsed_ms,
        "Query processed"
    );

    Ok(PipelineRun {
        question: question.to_string(),
        context,
        response,
        report,
        decision,
        elapsed_ms,
    })
}

/// Never fails: errors become a user-visible message with an empty report.
pub async fn predict(ctx: &PipelineContext, question: &str) -> PredictOutcome {
    predict_with_ground_truth(ctx, question, None).await
}

pub async fn predict_with_ground_truth(
    ctx: &PipelineContext,
    question: &str,
    ground_truth: Option<&str>,
) -> PredictOutcome {
    let result = AssertUnwindSafe(run_query(ctx, question, ground_truth))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(run)) => run.into_outcome(),
        Ok(Err(err)) => {
            tracing::warn!("Query failed: {}", err);
            error_outcome(&err)
        }
        Err(_) => {
            tracing::error!("Query panicked");
            error_outcome(&ApiError::Internal("unexpected internal failure".to_string()))
        }
    }
}

fn error_outcome(err: &ApiError) -> PredictOutcome {
    let final_answer = match err {
        ApiError::Configuration(message) => message.clone(),
        ApiError::BadRequest(message) => message.clone(),
        other => format!("Error during processing: {}", other),
    };
    PredictOutcome {
        final_answer,
        report: EvaluationReport::empty(),
        decision: None,
    }
}
