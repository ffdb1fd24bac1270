//! In-memory conversation history.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::MemoryError;
use crate::types::{ChatMessage, Conversation, ConversationId};

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty conversation over `corpus_id`.
    pub async fn create(&self, corpus_id: &str) -> Conversation {
        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId::generate(),
            corpus_id: corpus_id.to_owned(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation.clone());
        tracing::debug!(conversation_id = %conversation.id, corpus_id, "conversation created");
        conversation
    }

    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] for an unknown id.
    pub async fn get(&self, id: &ConversationId) -> Result<Conversation, MemoryError> {
        self.conversations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(id.clone()))
    }

    /// Append `message` and refresh `updated_at`.
    ///
    /// A timestamp earlier than the previous message's is raised to it, so
    /// messages stay in chronological order whatever the caller stamped.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] for an unknown id.
    pub async fn append(&self, id: &ConversationId, message: ChatMessage) -> Result<(), MemoryError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| MemoryError::NotFound(id.clone()))?;
        push_ordered(conversation, message);
        Ok(())
    }

    /// Return the last `limit` messages, oldest first, then append `message`,
    /// both under one lock.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] for an unknown id.
    pub async fn append_with_history(
        &self,
        id: &ConversationId,
        message: ChatMessage,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, MemoryError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| MemoryError::NotFound(id.clone()))?;
        let history = last_n(&conversation.messages, limit);
        push_ordered(conversation, message);
        Ok(history)
    }

    /// The last `limit` messages, oldest first. Empty for an unknown id.
    pub async fn recent(&self, id: &ConversationId, limit: usize) -> Vec<ChatMessage> {
        let conversations = self.conversations.read().await;
        let Some(conversation) = conversations.get(id) else {
            return Vec::new();
        };
        last_n(&conversation.messages, limit)
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn last_n(messages: &[ChatMessage], limit: usize) -> Vec<ChatMessage> {
    let skip = messages.len().saturating_sub(limit);
    messages[skip..].to_vec()
}

fn push_ordered(conversation: &mut Conversation, mut message: ChatMessage) {
    if let Some(last) = conversation.messages.last() {
        message.timestamp = message.timestamp.max(last.timestamp);
    }
    conversation.updated_at = Utc::now().max(message.timestamp);
    conversation.messages.push(message);
}
