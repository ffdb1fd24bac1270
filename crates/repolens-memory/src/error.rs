use crate::types::ConversationId;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),
}
