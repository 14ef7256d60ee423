//! Translating chat client: streamed chat turns, conversation persistence and
//! text-to-speech playback against the lingua backend.

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod service;
pub mod text;

#[cfg(feature = "native")]
pub mod client;

pub use config::ApiConfig;
pub use errors::{AudioError, ChatError, StoreError};
pub use models::{Conversation, Message, MessageRole};
