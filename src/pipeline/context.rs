//! PipelineContext: the long-lived, read-only collaborators of a query.
//!
//! Built once at start-up and shared behind an `Arc`. Every query borrows
//! it immutably, so concurrent queries never contend on shared state.

use std::sync::Arc;

use crate::core::config::settings::PipelineSettings;
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;
use crate::evaluation::{
    HallucinationJudge, LexicalMetrics, LlmJudge, MetricBackend, MetricEngine, RagasMetrics,
    StatusTable,
};
use crate::guardrail::Guardrail;
use crate::llm::{
    AnswerGenerator, Embedder, HashingEmbedder, LlmAnswerGenerator, LlmProvider, OpenAiProvider,
    ProviderEmbedder,
};
use crate::rag::{ContextStore, InMemoryContextStore, LoaderConfig, MmrConfig, PolicyLoader};
use crate::state::error::InitializationError;

pub struct PipelineContext {
    store: Arc<dyn ContextStore>,
    generator: Arc<dyn AnswerGenerator>,
    metrics: MetricEngine,
    guardrail: Guardrail,
    settings: PipelineSettings,
}

impl PipelineContext {
    /// Assembles a context from already-built parts.
    pub fn new(
        store: Arc<dyn ContextStore>,
        generator: Arc<dyn AnswerGenerator>,
        metrics: MetricEngine,
        settings: PipelineSettings,
    ) -> Self {
        let guardrail = Guardrail::new(settings.guardrail.clone());
        Self {
            store,
            generator,
            metrics,
            guardrail,
            settings,
        }
    }

    /// Builds the provider, indexes the policy documents and wires the metric
    /// backends. Any failure aborts start-up.
    pub async fn initialize(
        paths: &AppPaths,
        settings: PipelineSettings,
    ) -> Result<Self, InitializationError> {
        let llm = &settings.llm;
        let retrieval = &settings.retrieval;

        // Indexing with remote embeddings is the first external call.
        if !retrieval.hashing_embedder {
            llm.check_credentials()
                .map_err(|e| InitializationError::Config(e.into()))?;
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(
            OpenAiProvider::new(llm.base_url.clone(), llm.api_key.clone(), llm.timeout)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let embedder: Arc<dyn Embedder> = if retrieval.hashing_embedder {
            Arc::new(HashingEmbedder::default())
        } else {
            Arc::new(ProviderEmbedder::new(
                provider.clone(),
                llm.embedding_model.clone(),
            ))
        };

        let loader = PolicyLoader::new(LoaderConfig {
            chunk_size: retrieval.chunk_size,
            chunk_overlap: retrieval.chunk_overlap,
        });
        let document_paths: Vec<_> = retrieval
            .document_paths
            .iter()
            .map(|path| paths.resolve(path))
            .collect();
        let passages = loader
            .load_paths(&document_paths)
            .map_err(|e| InitializationError::Rag(e.into()))?;
        if passages.is_empty() {
            return Err(InitializationError::Rag(anyhow::anyhow!(
                "no policy passages found in {:?}",
                retrieval.document_paths
            )));
        }

        let store = InMemoryContextStore::build(
            passages,
            embedder.clone(),
            MmrConfig {
                fetch_k: retrieval.fetch_k,
                lambda: retrieval.mmr_lambda,
            },
        )
        .await
        .map_err(|e| InitializationError::Rag(e.into()))?;

        let generator = LlmAnswerGenerator::new(provider.clone(), llm.model.clone(), llm.temperature);

        let backends = build_backends(&settings, provider, embedder)
            .map_err(|e| InitializationError::Evaluation(e.into()))?;
        let metrics = MetricEngine::new(
            backends,
            settings.evaluation.metric_timeout,
            StatusTable::new(
                settings.guardrail.faithfulness_min,
                settings.guardrail.hallucination_max,
            ),
        )
        .map_err(|e| InitializationError::Evaluation(e.into()))?;

        tracing::info!(
            "Pipeline ready: {} passages, generator {}, metric backends [{}]",
            store.len(),
            llm.model,
            settings.evaluation.backends.join(", ")
        );

        Ok(Self::new(Arc::new(store), Arc::new(generator), metrics, settings))
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn generator(&self) -> &Arc<dyn AnswerGenerator> {
        &self.generator
    }

    pub fn metrics(&self) -> &MetricEngine {
        &self.metrics
    }

    pub fn guardrail(&self) -> &Guardrail {
        &self.guardrail
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }
}

/// Maps configured backend names onto metric backends.
pub fn build_backends(
    settings: &PipelineSettings,
    provider: Arc<dyn LlmProvider>,
    embedder: Arc<dyn Embedder>,
) -> Result<Vec<MetricBackend>, ApiError> {
    let judge = LlmJudge::new(provider, settings.llm.judge_model.clone());
    settings
        .evaluation
        .backends
        .iter()
        .map(|name| match name.as_str() {
            "ragas" => Ok(MetricBackend::Statistical(Arc::new(RagasMetrics::new(
                judge.clone(),
                embedder.clone(),
            )))),
            "lexical" => Ok(MetricBackend::Statistical(Arc::new(LexicalMetrics::new()))),
            "hallucination" => Ok(MetricBackend::ModelGraded(Arc::new(
                HallucinationJudge::new(judge.clone()),
            ))),
            other => Err(ApiError::Configuration(format!(
                "unknown metric backend '{}'",
                other
            ))),
        })
        .collect()
}
