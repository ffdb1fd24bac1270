//! Source ingestion and keyword-heuristic retrieval.
//!
//! Files from a local directory or a GitHub repository are split into
//! overlapping line-addressed chunks, embedded in batches, and published to an
//! in-memory [`ContentIndex`] one corpus at a time. Retrieval ranks a corpus's
//! chunks with a deterministic lexical + language + file-type score.

pub mod backend;
pub mod chunker;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod loader;
pub mod retriever;
pub mod scorer;
pub mod store;

pub use backend::{BackendTimeouts, KnowledgeBackend, RetrievalConfig};
pub use chunker::{Chunk, ChunkerConfig, chunk_file};
pub use error::{IndexError, LoadError, Result};
pub use indexer::IngestReport;
pub use loader::{DefaultLoader, FsLoader, GithubLoader, SourceDescriptor, SourceLoader};
pub use scorer::{Scorer, ScoringWeights};
pub use store::{ContentIndex, CorpusSnapshot, RetrievedChunk};
