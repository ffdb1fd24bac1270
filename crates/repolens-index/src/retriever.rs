//! Corpus-scoped retrieval with widening for language questions.

use repolens_llm::LlmProvider;

use crate::backend::KnowledgeBackend;
use crate::error::{IndexError, Result};
use crate::languages::{LANGUAGES, is_manifest, is_readme};
use crate::loader::SourceLoader;
use crate::scorer::QueryProfile;
use crate::store::{CorpusSnapshot, RetrievedChunk};

impl<L: SourceLoader, P: LlmProvider> KnowledgeBackend<L, P> {
    /// Retrieve the chunks of `corpus_id` most relevant to `query`.
    ///
    /// Ranking and widening read one snapshot of the corpus, so a concurrent
    /// re-ingestion or deletion is seen either entirely or not at all. An
    /// unknown or empty corpus yields an empty result, not an error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank query.
    pub async fn retrieve(&self, corpus_id: &str, query: &str) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Err(IndexError::InvalidInput("query is empty".into()));
        }
        let Some(snapshot) = self.index.snapshot(corpus_id).await else {
            tracing::debug!(corpus_id, "corpus not ingested");
            return Ok(Vec::new());
        };

        let profile = QueryProfile::analyze(query);
        let mut results = snapshot.search(&profile, self.retrieval.limit);

        if profile.is_meta() && results.len() < self.retrieval.meta_min_results {
            let before = results.len();
            self.widen(&snapshot, &profile, &mut results);
            tracing::debug!(corpus_id, added = results.len() - before, "widened language query");
        }

        tracing::debug!(corpus_id, results = results.len(), "retrieval finished");
        Ok(results)
    }

    /// Append manifest, README and language-extension chunks not already present.
    fn widen(&self, snapshot: &CorpusSnapshot, profile: &QueryProfile, results: &mut Vec<RetrievedChunk>) {
        let named = profile.languages();
        for chunk in snapshot.chunks() {
            if results.len() >= self.retrieval.widen_cap {
                break;
            }
            if results.iter().any(|r| r.id == chunk.id) {
                continue;
            }
            let path = chunk.file_path.to_lowercase();
            let extension_hit = if named.is_empty() {
                LANGUAGES.iter().any(|l| l.has_extension(&path))
            } else {
                named.iter().any(|l| l.has_extension(&path))
            };
            if is_manifest(&path) || is_readme(&path) || extension_hit {
                results.push(RetrievedChunk::from_chunk(chunk, self.retrieval.neutral_score));
            }
        }
    }
}
