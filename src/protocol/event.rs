use serde::{Deserialize, Serialize};

/// One event of the chat response stream, internally tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Translation of the user's message, plus the language the backend
    /// detected it was written in.
    #[serde(rename_all = "camelCase")]
    Translation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        translated_message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detected_language: Option<String>,
    },
    /// Next fragment of the assistant reply.
    #[serde(rename_all = "camelCase")]
    PartialResponse {
        #[serde(default)]
        partial_response: String,
    },
    #[serde(rename_all = "camelCase")]
    FinalResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_response: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        translated_response: Option<String>,
    },
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Translation { .. } => "translation",
            StreamEvent::PartialResponse { .. } => "partial-response",
            StreamEvent::FinalResponse { .. } => "final-response",
        }
    }

    /// Encodes the event as one wire frame, terminator included.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
