//! Ingestion: load → chunk → embed → publish.

use std::time::Instant;

use repolens_llm::{LlmError, LlmProvider};

use crate::backend::KnowledgeBackend;
use crate::chunker::{Chunk, chunk_file};
use crate::error::{IndexError, Result};
use crate::loader::{SourceDescriptor, SourceLoader};

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub corpus_id: String,
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub chunks_created: usize,
    /// Loaded file paths in loader order.
    pub file_paths: Vec<String>,
    pub readme: Option<String>,
    pub duration_ms: u64,
}

impl<L: SourceLoader, P: LlmProvider> KnowledgeBackend<L, P> {
    /// Ingest `source` (a GitHub URL or a local directory) and return its corpus id.
    ///
    /// # Errors
    ///
    /// See [`Self::ingest_with_report`].
    pub async fn ingest(&self, source: &str) -> Result<String> {
        Ok(self.ingest_with_report(source).await?.corpus_id)
    }

    /// Ingest `source`, replacing any earlier content of the same corpus.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unparseable source, `Upstream` or
    /// `Timeout` when loading fails, and `PartialIngestion` or `Timeout` when
    /// embedding fails. On error the previously indexed corpus is untouched.
    pub async fn ingest_with_report(&self, source: &str) -> Result<IngestReport> {
        let descriptor = SourceDescriptor::parse(source)?;
        self.ingest_source(&descriptor).await
    }

    /// Ingest an already parsed source.
    ///
    /// # Errors
    ///
    /// See [`Self::ingest_with_report`].
    pub async fn ingest_source(&self, descriptor: &SourceDescriptor) -> Result<IngestReport> {
        let start = Instant::now();
        let corpus_id = descriptor.corpus_id();
        tracing::info!(corpus_id = %corpus_id, source = %descriptor, "ingestion started");

        let loaded = tokio::time::timeout(self.timeouts.loader, self.loader.load(descriptor))
            .await
            .map_err(|_| IndexError::Timeout {
                stage: "load",
                secs: self.timeouts.loader.as_secs(),
            })?
            .map_err(|source| IndexError::Upstream {
                stage: "load",
                source,
            })?;

        let mut chunks: Vec<Chunk> = loaded
            .files
            .iter()
            .flat_map(|f| chunk_file(&f.path, &f.content, &corpus_id, &self.chunker))
            .collect();
        tracing::debug!(
            corpus_id = %corpus_id,
            files = loaded.files.len(),
            chunks = chunks.len(),
            "chunking done"
        );

        self.embed_chunks(&corpus_id, &mut chunks).await?;

        let chunks_created = chunks.len();
        self.index.replace_corpus(&corpus_id, chunks).await;

        let report = IngestReport {
            corpus_id,
            files_loaded: loaded.files.len(),
            files_skipped: loaded.skipped,
            chunks_created,
            file_paths: loaded.files.into_iter().map(|f| f.path).collect(),
            readme: loaded.readme,
            duration_ms: start.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        };
        tracing::info!(
            corpus_id = %report.corpus_id,
            files = report.files_loaded,
            skipped = report.files_skipped,
            chunks = report.chunks_created,
            elapsed_ms = report.duration_ms,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Attach vectors to `chunks` in ordered batches. All or nothing.
    async fn embed_chunks(&self, corpus_id: &str, chunks: &mut [Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        if !self.provider.supports_embeddings() {
            tracing::warn!(
                provider = self.provider.name(),
                "provider has no embedding model, indexing without vectors"
            );
            return Ok(());
        }

        let total = chunks.len();
        let batch_size = self.retrieval.embed_batch_size.max(1);
        let partial = |source: LlmError| IndexError::PartialIngestion {
            corpus_id: corpus_id.to_owned(),
            chunks: total,
            source,
        };

        for group in chunks.chunks_mut(batch_size) {
            let texts: Vec<String> = group.iter().map(|c| c.content.clone()).collect();
            let vectors = tokio::time::timeout(self.timeouts.embedding, self.provider.embed_batch(&texts))
                .await
                .map_err(|_| IndexError::Timeout {
                    stage: "embed",
                    secs: self.timeouts.embedding.as_secs(),
                })?
                .map_err(partial)?;

            if vectors.len() != texts.len() {
                return Err(partial(LlmError::EmbedMismatch {
                    expected: texts.len(),
                    actual: vectors.len(),
                }));
            }
            for (chunk, vector) in group.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::error::LoadError;
    use crate::loader::{LoadedSource, SourceDescriptor, SourceFile, SourceLoader};

    /// Serves the same files for any GitHub descriptor.
    #[derive(Clone, Default)]
    pub struct StaticLoader {
        pub files: Vec<(String, String)>,
        pub readme: Option<String>,
        pub fail: bool,
    }

    impl StaticLoader {
        pub fn with_files(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| ((*p).to_owned(), (*c).to_owned()))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl SourceLoader for StaticLoader {
        async fn load(&self, _source: &SourceDescriptor) -> Result<LoadedSource, LoadError> {
            if self.fail {
                return Err(LoadError::Status {
                    url: "https://api.github.com/repos/o/r/contents/".into(),
                    status: 404,
                });
            }
            Ok(LoadedSource {
                files: self
                    .files
                    .iter()
                    .map(|(path, content)| SourceFile {
                        path: path.clone(),
                        content: content.clone(),
                    })
                    .collect(),
                readme: self.readme.clone(),
                skipped: 0,
            })
        }
    }
}
