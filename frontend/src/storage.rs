use web_sys::Storage;

use lingua_chat::StoreError;
use lingua_chat::db::ConversationStore;
use lingua_chat::models::Conversation;

use crate::api::js_message;

/// `localStorage` key holding the conversation array.
const STORAGE_KEY: &str = "conversations";

/// Conversations persisted in the browser's `localStorage`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorageStore;

fn local_storage() -> Result<Storage, StoreError> {
    web_sys::window()
        .ok_or_else(|| StoreError::backend("no window"))?
        .local_storage()
        .map_err(|e| StoreError::backend(js_message(&e)))?
        .ok_or_else(|| StoreError::backend("localStorage is disabled"))
}

impl ConversationStore for LocalStorageStore {
    fn load(&self) -> Result<Vec<Conversation>, StoreError> {
        let raw = local_storage()?
            .get_item(STORAGE_KEY)
            .map_err(|e| StoreError::backend(js_message(&e)))?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, conversations: &[Conversation]) -> Result<(), StoreError> {
        let json = serde_json::to_string(conversations)?;
        local_storage()?
            .set_item(STORAGE_KEY, &json)
            .map_err(|e| StoreError::backend(js_message(&e)))
    }
}
