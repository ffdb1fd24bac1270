//! The knowledge backend: one handle over the index, a loader and an embedder.

use std::sync::Arc;
use std::time::Duration;

use repolens_llm::LlmProvider;
use serde::{Deserialize, Serialize};

use crate::chunker::ChunkerConfig;
use crate::loader::SourceLoader;
use crate::store::ContentIndex;

/// Retrieval and ingestion tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned per query (default: 5).
    pub limit: usize,
    /// Meta queries with fewer results than this are widened (default: 3).
    pub meta_min_results: usize,
    /// Widening stops at this many results (default: 8).
    pub widen_cap: usize,
    /// Score given to chunks added by widening (default: 1.0).
    pub neutral_score: f32,
    /// Chunk contents sent per embedding request (default: 64).
    pub embed_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            meta_min_results: 3,
            widen_cap: 8,
            neutral_score: 1.0,
            embed_batch_size: 64,
        }
    }
}

/// Time budgets for external calls made during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub loader: Duration,
    pub embedding: Duration,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            loader: Duration::from_secs(300),
            embedding: Duration::from_secs(60),
        }
    }
}

/// Ingests sources into a shared [`ContentIndex`] and retrieves from it.
pub struct KnowledgeBackend<L: SourceLoader, P: LlmProvider> {
    pub(crate) index: Arc<ContentIndex>,
    pub(crate) loader: L,
    pub(crate) provider: Arc<P>,
    pub(crate) chunker: ChunkerConfig,
    pub(crate) retrieval: RetrievalConfig,
    pub(crate) timeouts: BackendTimeouts,
}

impl<L: SourceLoader, P: LlmProvider> KnowledgeBackend<L, P> {
    #[must_use]
    pub fn new(index: Arc<ContentIndex>, loader: L, provider: Arc<P>) -> Self {
        Self {
            index,
            loader,
            provider,
            chunker: ChunkerConfig::default(),
            retrieval: RetrievalConfig::default(),
            timeouts: BackendTimeouts::default(),
        }
    }

    #[must_use]
    pub fn with_chunker(mut self, chunker: ChunkerConfig) -> Self {
        self.chunker = chunker;
        self
    }

    #[must_use]
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: BackendTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<ContentIndex> {
        &self.index
    }

    #[must_use]
    pub fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval
    }
}
