use tracing::{error, info};

use crate::db::ConversationStore;
use crate::errors::StoreError;
use crate::models::{Conversation, Message};

/// Create/select/delete/update over the conversation store.
///
/// The selection is kept as an id and resolved against the stored list on
/// every read, so the selected view always reflects the latest update.
#[derive(Debug, Clone)]
pub struct ConversationController<S> {
    store: S,
    conversations: Vec<Conversation>,
    selected: Option<String>,
}

impl<S: ConversationStore> ConversationController<S> {
    /// Loads the stored conversations. Nothing is selected initially.
    pub fn load(store: S) -> Result<Self, StoreError> {
        let conversations = store.load()?;
        info!("Loaded {} conversations", conversations.len());
        Ok(Self { store, conversations, selected: None })
    }

    /// Starts from `conversations` without reading the store.
    pub fn with_conversations(store: S, conversations: Vec<Conversation>) -> Self {
        Self { store, conversations, selected: None }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Conversation> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    /// Adds an empty conversation with the default language pair and selects
    /// it.
    pub fn create(&mut self) -> Result<&Conversation, StoreError> {
        let conversation = Conversation::new(format!("Conversation {}", self.conversations.len() + 1));
        info!("Created conversation {}", conversation.id);
        self.selected = Some(conversation.id.clone());
        self.conversations.push(conversation);
        self.persist()?;
        Ok(&self.conversations[self.conversations.len() - 1])
    }

    pub fn select(&mut self, id: &str) -> Result<&Conversation, StoreError> {
        let index = self.index_of(id)?;
        self.selected = Some(id.to_string());
        Ok(&self.conversations[index])
    }

    /// Removes a conversation; clears the selection only if it was selected.
    pub fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let index = self.index_of(id)?;
        self.conversations.remove(index);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        info!("Deleted conversation {id}");
        self.persist()
    }

    /// Replaces the stored record with the same id.
    pub fn update(&mut self, mut conversation: Conversation) -> Result<(), StoreError> {
        let index = self.index_of(&conversation.id)?;
        conversation.touch();
        self.conversations[index] = conversation;
        self.persist()
    }

    /// Replaces only the message list. This is the target of the chat
    /// session's publish callback.
    pub fn update_messages(&mut self, id: &str, messages: &[Message]) -> Result<(), StoreError> {
        let index = self.index_of(id)?;
        let conversation = &mut self.conversations[index];
        conversation.messages = messages.to_vec();
        conversation.touch();
        self.persist()
    }

    /// Removes one message, e.g. the placeholder of a cancelled send. A
    /// message that is already gone leaves the record untouched.
    pub fn discard_message(&mut self, id: &str, message_id: &str) -> Result<(), StoreError> {
        let index = self.index_of(id)?;
        let conversation = &mut self.conversations[index];
        let before = conversation.messages.len();
        conversation.messages.retain(|m| m.id != message_id);
        if conversation.messages.len() == before {
            return Ok(());
        }
        conversation.touch();
        info!("Discarded message {message_id} from conversation {id}");
        self.persist()
    }

    pub fn set_languages(
        &mut self,
        id: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<(), StoreError> {
        let index = self.index_of(id)?;
        let conversation = &mut self.conversations[index];
        conversation.source_language = source_language.to_string();
        conversation.target_language = target_language.to_string();
        conversation.touch();
        self.persist()
    }

    fn index_of(&self, id: &str) -> Result<usize, StoreError> {
        self.conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.store.save(&self.conversations).map_err(|e| {
            error!("Failed to save conversations: {e}");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{DEFAULT_SOURCE_LANGUAGE, DEFAULT_TARGET_LANGUAGE};

    fn controller() -> (ConversationController<MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        (ConversationController::load(store.clone()).unwrap(), store)
    }

    #[test]
    fn create_selects_and_persists() {
        let (mut ctrl, store) = controller();
        let first = ctrl.create().unwrap().clone();
        let second = ctrl.create().unwrap().clone();

        assert_eq!(first.title, "Conversation 1");
        assert_eq!(second.title, "Conversation 2");
        assert!(second.messages.is_empty());
        assert_eq!(second.source_language, DEFAULT_SOURCE_LANGUAGE);
        assert_eq!(second.target_language, DEFAULT_TARGET_LANGUAGE);
        assert_eq!(ctrl.selected_id(), Some(second.id.as_str()));
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn deleting_selected_clears_selection() {
        let (mut ctrl, store) = controller();
        let id = ctrl.create().unwrap().id.clone();
        ctrl.delete(&id).unwrap();
        assert_eq!(ctrl.selected(), None);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn deleting_other_keeps_selection() {
        let (mut ctrl, _store) = controller();
        let other = ctrl.create().unwrap().id.clone();
        let kept = ctrl.create().unwrap().id.clone();
        ctrl.select(&kept).unwrap();

        ctrl.delete(&other).unwrap();

        assert_eq!(ctrl.selected().map(|c| c.id.as_str()), Some(kept.as_str()));
    }

    #[test]
    fn selected_view_follows_updates() {
        let (mut ctrl, store) = controller();
        let id = ctrl.create().unwrap().id.clone();

        let messages = vec![Message::user_pending("hola")];
        ctrl.update_messages(&id, &messages).unwrap();
        assert_eq!(ctrl.selected().unwrap().messages, messages);

        ctrl.set_languages(&id, "de", "ru").unwrap();
        let selected = ctrl.selected().unwrap();
        assert_eq!(selected.messages, messages);
        assert_eq!(selected.target_language, "ru");
        assert_eq!(store.snapshot()[0], *selected);
    }

    #[test]
    fn update_replaces_by_id_and_bumps_timestamp() {
        let (mut ctrl, _store) = controller();
        let mut conv = ctrl.create().unwrap().clone();
        let before = conv.updated_at;
        conv.title = "Trip to Madrid".into();

        ctrl.update(conv.clone()).unwrap();

        let stored = ctrl.get(&conv.id).unwrap();
        assert_eq!(stored.title, "Trip to Madrid");
        assert!(stored.updated_at >= before);
    }

    #[test]
    fn discard_message_removes_only_that_message() {
        let (mut ctrl, store) = controller();
        let id = ctrl.create().unwrap().id.clone();
        let user = Message::user_pending("hola");
        let placeholder = Message::assistant_placeholder();
        ctrl.update_messages(&id, &[user.clone(), placeholder.clone()]).unwrap();

        ctrl.discard_message(&id, &placeholder.id).unwrap();
        assert_eq!(store.snapshot()[0].messages, vec![user.clone()]);

        ctrl.discard_message(&id, "already-gone").unwrap();
        assert_eq!(ctrl.selected().unwrap().messages, vec![user]);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (mut ctrl, _store) = controller();
        assert!(ctrl.select("missing").unwrap_err().is_not_found());
        assert!(ctrl.update_messages("missing", &[]).unwrap_err().is_not_found());
    }

    #[test]
    fn load_reads_existing_records() {
        let existing = Conversation::new("Conversation 1");
        let store = MemoryStore::with_conversations(vec![existing.clone()]);
        let ctrl = ConversationController::load(store).unwrap();
        assert_eq!(ctrl.conversations(), &[existing]);
        assert_eq!(ctrl.selected(), None);
    }
}
