pub mod conversation_store;
#[cfg(feature = "native")]
pub mod json_file_store;

pub use conversation_store::{ConversationStore, MemoryStore};
#[cfg(feature = "native")]
pub use json_file_store::JsonFileStore;
