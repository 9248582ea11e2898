use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::evaluation::EvaluationReport;
use crate::guardrail::GuardrailDecision;
use crate::pipeline::{self, PipelineRun};
use crate::rag::RetrievedPassage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub answer: String,
    pub report: EvaluationReport,
    pub decision: Option<GuardrailDecision>,
}

/// Always 200: pipeline failures come back as the answer text with an empty report.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> impl IntoResponse {
    let outcome = pipeline::predict(&state.pipeline, &request.question).await;
    Json(PredictResponse {
        answer: outcome.final_answer,
        report: outcome.report,
        decision: outcome.decision,
    })
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub question: String,
    #[serde(default)]
    pub ground_truth: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub answer: String,
    pub reasoning: String,
    pub contexts: Vec<RetrievedPassage>,
    pub report: EvaluationReport,
    pub decision: GuardrailDecision,
    pub elapsed_ms: u64,
}

impl From<PipelineRun> for EvaluateResponse {
    fn from(run: PipelineRun) -> Self {
        Self {
            answer: run.final_answer(),
            reasoning: run.response.reasoning,
            contexts: run.context.passages().to_vec(),
            report: run.report,
            decision: run.decision,
            elapsed_ms: run.elapsed_ms,
        }
    }
}

/// Full pipeline run with an explicit ground truth; errors map to HTTP status codes.
pub async fn evaluate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let run = pipeline::run_query(
        &state.pipeline,
        &request.question,
        request.ground_truth.as_deref(),
    )
    .await?;
    Ok(Json(EvaluateResponse::from(run)))
}
