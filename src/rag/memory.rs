//! In-process vector store.
//!
//! Passages are embedded once when the store is built; queries are embedded
//! on demand and re-ranked with maximal marginal relevance.

use std::sync::Arc;

use async_trait::async_trait;

use super::store::{ContextStore, RetrievedPassage};
use crate::core::errors::ApiError;
use crate::llm::Embedder;
use crate::vector_math::{maximal_marginal_relevance, rank_descending_by_cosine};

#[derive(Debug, Clone, Copy)]
pub struct MmrConfig {
    /// Candidates fetched by plain similarity before re-ranking.
    pub fetch_k: usize,
    pub lambda: f32,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            fetch_k: 20,
            lambda: 0.5,
        }
    }
}

pub struct InMemoryContextStore {
    passages: Vec<RetrievedPassage>,
    embeddings: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
    mmr: MmrConfig,
}

impl InMemoryContextStore {
    /// Embeds every passage up front. Fails if the embedder does.
    pub async fn build(
        passages: Vec<RetrievedPassage>,
        embedder: Arc<dyn Embedder>,
        mmr: MmrConfig,
    ) -> Result<Self, ApiError> {
        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;
        if embeddings.len() != passages.len() {
            return Err(ApiError::Internal(format!(
                "embedder returned {} vectors for {} passages",
                embeddings.len(),
                passages.len()
            )));
        }

        tracing::info!(
            "Indexed {} policy passages with the {} embedder",
            passages.len(),
            embedder.name()
        );

        Ok(Self {
            passages,
            embeddings,
            embedder,
            mmr,
        })
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>, ApiError> {
        if self.passages.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::backend(self.embedder.name(), "no query embedding returned"))?;

        let fetch_k = self.mmr.fetch_k.max(k);
        let candidates: Vec<usize> = rank_descending_by_cosine(&query_embedding, &self.embeddings)?
            .into_iter()
            .take(fetch_k)
            .map(|(idx, _)| idx)
            .collect();

        let candidate_vectors: Vec<Vec<f32>> = candidates
            .iter()
            .map(|&idx| self.embeddings[idx].clone())
            .collect();

        let picks = maximal_marginal_relevance(&query_embedding, &candidate_vectors, k, self.mmr.lambda)?;

        Ok(picks
            .into_iter()
            .map(|pick| self.passages[candidates[pick]].clone())
            .collect())
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}
