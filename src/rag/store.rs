//! ContextStore trait: the retrieval side of the pipeline.
//!
//! A store is built once at start-up and is read-only afterwards, so the
//! pipeline can share it across concurrent queries without locking.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// Per-passage metadata. Only used for audit display, never for guardrail logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// US state the policy applies to, or `N/A`.
    pub state: String,
    pub year: u16,
    /// File the passage came from.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub content: String,
    pub metadata: PassageMetadata,
}

/// Ordered snapshot of one query's retrieval; order is relevance rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    passages: Vec<RetrievedPassage>,
}

impl RetrievedContext {
    pub fn new(passages: Vec<RetrievedPassage>) -> Self {
        Self { passages }
    }

    pub fn passages(&self) -> &[RetrievedPassage] {
        &self.passages
    }

    pub fn texts(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.content.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `k` passages, most relevant first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>, ApiError>;

    /// Number of indexed passages.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
