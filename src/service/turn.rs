use crate::models::{ChatRequest, Conversation, HistoryEntry, Message};
use crate::protocol::StreamEvent;

/// Working state of one send: the ids of the two messages it owns, the
/// running reply text, and the transcript it publishes at every checkpoint.
#[derive(Debug, Clone)]
pub struct Turn {
    user_id: String,
    assistant_id: String,
    target_language: String,
    accumulated: String,
    messages: Vec<Message>,
}

impl Turn {
    /// Appends the user message and the assistant placeholder to a copy of
    /// the conversation's transcript, as one step.
    pub fn begin(conversation: &Conversation, user_text: &str) -> Self {
        let user = Message::user_pending(user_text);
        let assistant = Message::assistant_placeholder();

        let mut messages = conversation.messages.clone();
        let user_id = user.id.clone();
        let assistant_id = assistant.id.clone();
        messages.push(user);
        messages.push(assistant);

        Self {
            user_id,
            assistant_id,
            target_language: conversation.target_language.clone(),
            accumulated: String::new(),
            messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Builds the request: history covers everything up to and including the
    /// new user message, but not the assistant placeholder.
    pub fn request(&self, conversation: &Conversation, user_text: &str) -> ChatRequest {
        let conversation_history = self
            .messages
            .iter()
            .filter(|m| m.id != self.assistant_id)
            .map(HistoryEntry::from)
            .collect();

        ChatRequest {
            message: user_text.to_string(),
            input_language: conversation.source_language.clone(),
            output_language: conversation.target_language.clone(),
            conversation_history,
        }
    }

    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Translation {
                original_message,
                translated_message,
                detected_language,
            } => {
                // The user typed in the output language: show the translation
                // as the main line and what they typed underneath.
                let mirrored =
                    detected_language.as_deref() == Some(self.target_language.as_str());
                let Some(user) = find_mut(&mut self.messages, &self.user_id) else {
                    return;
                };
                let original = non_empty(original_message);
                let translated = non_empty(translated_message);
                if mirrored {
                    let secondary = original.unwrap_or_else(|| user.original_text.clone());
                    user.original_text = translated.unwrap_or_default();
                    user.translated_text = secondary;
                } else {
                    if let Some(original) = original {
                        user.original_text = original;
                    }
                    if let Some(translated) = translated {
                        user.translated_text = translated;
                    }
                }
            }
            StreamEvent::PartialResponse { partial_response } => {
                self.accumulated.push_str(&partial_response);
                if let Some(assistant) = find_mut(&mut self.messages, &self.assistant_id) {
                    assistant.original_text = self.accumulated.clone();
                }
            }
            StreamEvent::FinalResponse {
                original_response,
                translated_response,
            } => {
                let Some(assistant) = find_mut(&mut self.messages, &self.assistant_id) else {
                    return;
                };
                assistant.original_text =
                    non_empty(original_response).unwrap_or_else(|| self.accumulated.clone());
                if let Some(translated) = non_empty(translated_response) {
                    assistant.translated_text = translated;
                }
            }
        }
    }

    /// Drops the assistant placeholder, leaving the user message as is.
    pub fn roll_back(&mut self) {
        let assistant_id = &self.assistant_id;
        self.messages.retain(|m| &m.id != assistant_id);
    }
}

fn find_mut<'a>(messages: &'a mut [Message], id: &str) -> Option<&'a mut Message> {
    messages.iter_mut().find(|m| m.id == id)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
