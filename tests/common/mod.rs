#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use policyqa_backend::core::config::PipelineSettings;
use policyqa_backend::core::errors::ApiError;
use policyqa_backend::evaluation::{
    EvaluationSample, GradedScore, MetricBackend, MetricEngine, MetricKind, ModelGradedMetric,
    StatisticalMetrics, StatisticalScores, StatusTable,
};
use policyqa_backend::llm::AnswerGenerator;
use policyqa_backend::pipeline::PipelineContext;
use policyqa_backend::rag::{ContextStore, PassageMetadata, RetrievedPassage};

pub const SPEED_PASSAGE: &str =
    "Remote employees must maintain a home internet connection of at least 50 Mbps.";

pub struct FixedStore {
    passages: Vec<RetrievedPassage>,
}

impl FixedStore {
    pub fn new(texts: &[&str]) -> Self {
        let passages = texts
            .iter()
            .map(|text| RetrievedPassage {
                content: text.to_string(),
                metadata: PassageMetadata {
                    state: "N/A".to_string(),
                    year: 2024,
                    source: "company_policy.txt".to_string(),
                },
            })
            .collect();
        Self { passages }
    }
}

#[async_trait]
impl ContextStore for FixedStore {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(&self, _query: &str, k: usize) -> Result<Vec<RetrievedPassage>, ApiError> {
        Ok(self.passages.iter().take(k).cloned().collect())
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}

/// A vector store that hangs on every search.
pub struct StallingStore;

#[async_trait]
impl ContextStore for StallingStore {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedPassage>, ApiError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(Vec::new())
    }

    fn len(&self) -> usize {
        0
    }
}

pub enum ScriptedGenerator {
    Reply(String),
    Fail(String),
    Panic,
    /// Never answers within any sane timeout.
    Stall,
}

impl ScriptedGenerator {
    pub fn reply(text: &str) -> Self {
        ScriptedGenerator::Reply(text.to_string())
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _query: &str, _context: &[String]) -> Result<String, ApiError> {
        match self {
            ScriptedGenerator::Reply(text) => Ok(text.clone()),
            ScriptedGenerator::Fail(message) => Err(ApiError::backend("scripted", message)),
            ScriptedGenerator::Panic => panic!("generator bug"),
            ScriptedGenerator::Stall => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(String::new())
            }
        }
    }
}

/// Reports the same statistical scores for every sample.
pub struct FixedStats {
    pub scores: Result<HashMap<MetricKind, f64>, String>,
}

impl FixedStats {
    pub fn all(faithfulness: f64, others: f64) -> Self {
        let mut scores: HashMap<MetricKind, f64> = MetricKind::STATISTICAL
            .iter()
            .map(|kind| (*kind, others))
            .collect();
        scores.insert(MetricKind::Faithfulness, faithfulness);
        Self { scores: Ok(scores) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            scores: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl StatisticalMetrics for FixedStats {
    fn name(&self) -> &str {
        "stats"
    }

    async fn evaluate(
        &self,
        _sample: &EvaluationSample,
    ) -> Result<StatisticalScores, ApiError> {
        self.scores
            .clone()
            .map(StatisticalScores::from)
            .map_err(|message| ApiError::backend("stats", message))
    }
}

pub struct FixedJudge {
    pub score: f64,
    pub reason: String,
}

impl FixedJudge {
    pub fn scoring(score: f64) -> Self {
        Self {
            score,
            reason: format!("contradiction rate {}", score),
        }
    }
}

#[async_trait]
impl ModelGradedMetric for FixedJudge {
    fn name(&self) -> &str {
        "judge"
    }

    async fn measure(
        &self,
        _question: &str,
        _answer: &str,
        _contexts: &[String],
    ) -> Result<GradedScore, ApiError> {
        Ok(GradedScore {
            score: self.score,
            reason: self.reason.clone(),
        })
    }
}

pub fn settings() -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.llm.api_key = Some("test-key".to_string());
    settings
}

pub fn context_with(
    settings: PipelineSettings,
    generator: ScriptedGenerator,
    stats: FixedStats,
    judge: FixedJudge,
) -> PipelineContext {
    context_over(
        Arc::new(FixedStore::new(&[SPEED_PASSAGE])),
        settings,
        generator,
        stats,
        judge,
    )
}

pub fn context_over(
    store: Arc<dyn ContextStore>,
    settings: PipelineSettings,
    generator: ScriptedGenerator,
    stats: FixedStats,
    judge: FixedJudge,
) -> PipelineContext {
    let metrics = MetricEngine::new(
        vec![
            MetricBackend::Statistical(Arc::new(stats)),
            MetricBackend::ModelGraded(Arc::new(judge)),
        ],
        Duration::from_secs(5),
        StatusTable::default(),
    )
    .expect("both metric families are present");
    PipelineContext::new(
        store,
        Arc::new(generator),
        metrics,
        settings,
    )
}

pub fn context(reply: &str, faithfulness: f64, hallucination: f64) -> PipelineContext {
    context_with(
        settings(),
        ScriptedGenerator::reply(reply),
        FixedStats::all(faithfulness, 0.9),
        FixedJudge::scoring(hallucination),
    )
}
