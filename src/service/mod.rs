pub mod audio_player;
pub mod chat_session;
pub mod conversation_controller;
pub mod turn;

pub use audio_player::{AudioController, AudioOutput, SpeechSynthesizer};
pub use chat_session::{ByteStream, ChatSession, ChatTransport};
pub use conversation_controller::ConversationController;
pub use turn::Turn;
