use std::sync::{Arc, Mutex};

use crate::errors::StoreError;
use crate::models::Conversation;

/// Persisted collection of conversations, read once at startup and written
/// whole after every mutation.
pub trait ConversationStore {
    fn load(&self) -> Result<Vec<Conversation>, StoreError>;
    fn save(&self, conversations: &[Conversation]) -> Result<(), StoreError>;
}

/// In-process store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    conversations: Arc<Mutex<Vec<Conversation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversations(conversations: Vec<Conversation>) -> Self {
        Self { conversations: Arc::new(Mutex::new(conversations)) }
    }

    /// Copy of what was last saved.
    pub fn snapshot(&self) -> Vec<Conversation> {
        self.conversations
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl ConversationStore for MemoryStore {
    fn load(&self) -> Result<Vec<Conversation>, StoreError> {
        self.conversations
            .lock()
            .map(|c| c.clone())
            .map_err(|e| StoreError::backend(e.to_string()))
    }

    fn save(&self, conversations: &[Conversation]) -> Result<(), StoreError> {
        let mut stored = self
            .conversations
            .lock()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        *stored = conversations.to_vec();
        Ok(())
    }
}
