//! Per-session conversation history for repolens.

pub mod conversation;
pub mod error;
pub mod types;

pub use conversation::ConversationStore;
pub use error::MemoryError;
pub use types::{ChatMessage, ChatRole, Conversation, ConversationId};
