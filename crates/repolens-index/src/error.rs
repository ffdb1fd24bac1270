//! Error types for repolens-index.

/// Errors raised by ingestion and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Malformed source descriptor or blank query.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An external collaborator failed before anything was indexed.
    #[error("{stage} failed: {source}")]
    Upstream {
        stage: &'static str,
        #[source]
        source: LoadError,
    },

    /// Embedding failed part-way; nothing from this ingestion was published.
    #[error("ingestion of {corpus_id} aborted after chunking {chunks} chunks: {source}")]
    PartialIngestion {
        corpus_id: String,
        chunks: usize,
        #[source]
        source: repolens_llm::LlmError,
    },

    /// An external call exceeded its time budget.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`crate::loader::SourceLoader`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("unsupported source: {0}")]
    Unsupported(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
