#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conversation {conversation_id} belongs to {expected}, not {requested}")]
    CorpusMismatch {
        conversation_id: repolens_memory::ConversationId,
        expected: String,
        requested: String,
    },

    #[error("retrieval failed")]
    Retrieval(#[source] repolens_index::IndexError),

    #[error(transparent)]
    Memory(#[from] repolens_memory::MemoryError),

    #[error(transparent)]
    Llm(#[from] repolens_llm::LlmError),

    #[error("completion timed out after {secs}s")]
    Timeout { secs: u64 },
}
