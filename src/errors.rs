use thiserror::Error;

/// Failure of a single chat turn. Every variant past validation is terminal
/// for that send; nothing is retried.
#[derive(Debug, Error)]
pub enum ChatError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("A message is already being sent in this session")]
    Busy,

    // ── Lifecycle ────────────────────────────────────────────────────────────
    /// The stream was dropped mid-turn. Nothing was published after the
    /// cancel, so the last stored checkpoint still holds `assistant_id`.
    #[error("Send was cancelled")]
    Cancelled { assistant_id: String },

    // ── Transport ────────────────────────────────────────────────────────────
    #[error("Network error: {message}")]
    Transport { message: String },

    #[error("Server error: HTTP status {status}")]
    HttpStatus { status: u16 },

    // ── Protocol ─────────────────────────────────────────────────────────────
    #[error("Malformed stream frame: {reason}")]
    MalformedFrame { reason: String },
}

impl ChatError {
    pub fn transport(message: impl Into<String>) -> Self {
        ChatError::Transport { message: message.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        ChatError::MalformedFrame { reason: reason.into() }
    }

    /// True for errors raised before the turn touched the transcript.
    pub fn is_rejected(&self) -> bool {
        matches!(self, ChatError::EmptyMessage | ChatError::Busy)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Cancelled { .. })
    }

    /// Placeholder a cancelled send left behind, for the caller to discard.
    pub fn cancelled_placeholder(&self) -> Option<&str> {
        match self {
            ChatError::Cancelled { assistant_id } => Some(assistant_id),
            _ => None,
        }
    }

    /// Transport errors that look like a TLS handshake problem.
    pub fn is_certificate_problem(&self) -> bool {
        match self {
            ChatError::Transport { message } => {
                message.contains("SSL") || message.contains("certificate")
            }
            _ => false,
        }
    }
}

/// Failure of a text-to-speech request or of clip playback. Always logged and
/// swallowed by the playback controller.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("TTS request failed: {message}")]
    Transport { message: String },

    #[error("Failed to generate audio: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Audio playback error: {message}")]
    Playback { message: String },

    #[error("Audio file error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    pub fn playback(message: impl Into<String>) -> Self {
        AudioError::Playback { message: message.into() }
    }
}

/// Persistence failure of the conversation store or controller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conversation '{id}' not found")]
    NotFound { id: String },

    #[error("Storage unavailable: {message}")]
    Backend { message: String },

    #[error("Storage I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored conversations are not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend { message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
