use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::ApiConfig;
use crate::errors::{AudioError, ChatError};
use crate::models::{ChatRequest, TtsRequest};
use crate::service::{ByteStream, ChatTransport, SpeechSynthesizer};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// reqwest client for the chat and TTS endpoints.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ApiConfig,
}

impl HttpClient {
    pub fn new(config: ApiConfig) -> Result<Self, reqwest::Error> {
        // Only the connect phase is bounded; a chat stream may stay open for as
        // long as the backend keeps generating.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }
}

/// Renders an error with its whole `source()` chain. reqwest's own message
/// stops at "error sending request", which hides TLS and DNS causes.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl ChatTransport for HttpClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let url = self.config.chat_message_url();
        debug!("Sending request to: {url}");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::transport(error_chain(&e)))?;

        if !response.status().is_success() {
            return Err(ChatError::HttpStatus { status: response.status().as_u16() });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ChatError::transport(error_chain(&e)))
            })
            .boxed_local())
    }
}

impl SpeechSynthesizer for HttpClient {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Vec<u8>, AudioError> {
        let response = self
            .client
            .post(self.config.tts_url())
            .json(request)
            .send()
            .await
            .map_err(|e| AudioError::Transport { message: error_chain(&e) })?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("").to_string();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or(reason);
            return Err(AudioError::HttpStatus { status: status.as_u16(), message });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| AudioError::Transport { message: error_chain(&e) })?;
        debug!("Received {} bytes of audio", audio.len());
        Ok(audio.to_vec())
    }
}
