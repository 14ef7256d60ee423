use futures_util::StreamExt;
use futures_util::stream;
use gloo_net::http::{Request, Response};
use js_sys::{Reflect, Uint8Array};
use serde::Deserialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{ReadableStream, ReadableStreamDefaultReader};

use lingua_chat::config::{ApiConfig, Environment};
use lingua_chat::models::{ChatRequest, TtsRequest};
use lingua_chat::service::{ByteStream, ChatTransport, SpeechSynthesizer};
use lingua_chat::{AudioError, ChatError};

/// Base URL baked in at build time, falling back to the per-build default.
pub fn api_config() -> ApiConfig {
    ApiConfig::resolve(None, option_env!("LINGUA_API_URL"), Environment::from_build())
}

/// `fetch`-backed client for the chat and TTS endpoints.
#[derive(Clone, Debug)]
pub struct FetchClient {
    config: ApiConfig,
}

impl FetchClient {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl ChatTransport for FetchClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let url = self.config.chat_message_url();
        log::debug!("Sending request to: {url}");

        let resp = Request::post(&url)
            .json(request)
            .map_err(|e| ChatError::transport(format!("Serialize error: {e}")))?
            .send()
            .await
            .map_err(|e| ChatError::transport(e.to_string()))?;

        if !resp.ok() {
            return Err(ChatError::HttpStatus { status: resp.status() });
        }

        let body = resp
            .body()
            .ok_or_else(|| ChatError::transport("No response body"))?;
        Ok(body_stream(body))
    }
}

/// Cancels the underlying read when the stream is dropped mid-flight.
struct ReaderGuard(ReadableStreamDefaultReader);

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        let _ = self.0.cancel();
    }
}

fn body_stream(body: ReadableStream) -> ByteStream {
    let reader: ReadableStreamDefaultReader = body.get_reader().unchecked_into();
    stream::unfold(Some(ReaderGuard(reader)), |guard| async move {
        let guard = guard?;
        match read_chunk(&guard.0).await {
            Ok(Some(bytes)) => Some((Ok(bytes), Some(guard))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed_local()
}

async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>, ChatError> {
    let result = JsFuture::from(reader.read())
        .await
        .map_err(|e| ChatError::transport(js_message(&e)))?;

    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .map_err(|e| ChatError::transport(js_message(&e)))?
        .as_bool()
        .unwrap_or(false);
    if done {
        return Ok(None);
    }

    let value = Reflect::get(&result, &JsValue::from_str("value"))
        .map_err(|e| ChatError::transport(js_message(&e)))?;
    Ok(Some(Uint8Array::new(&value).to_vec()))
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl SpeechSynthesizer for FetchClient {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Vec<u8>, AudioError> {
        let resp = Request::post(&self.config.tts_url())
            .json(request)
            .map_err(|e| AudioError::Transport { message: e.to_string() })?
            .send()
            .await
            .map_err(|e| AudioError::Transport { message: e.to_string() })?;

        if !resp.ok() {
            return Err(tts_error(resp).await);
        }

        resp.binary()
            .await
            .map_err(|e| AudioError::Transport { message: e.to_string() })
    }
}

async fn tts_error(resp: Response) -> AudioError {
    let status = resp.status();
    let status_text = resp.status_text();
    let message = match resp.json::<ErrorBody>().await {
        Ok(ErrorBody { error: Some(error) }) => error,
        _ => status_text,
    };
    AudioError::HttpStatus { status, message }
}

pub fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}
