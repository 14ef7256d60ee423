use js_sys::{Array, Promise, Uint8Array};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, HtmlAudioElement, Url};

use lingua_chat::AudioError;
use lingua_chat::service::AudioOutput;

use crate::api::js_message;

/// An `<audio>` element playing from a blob URL.
#[derive(Clone, Debug)]
pub struct WebClip {
    element: HtmlAudioElement,
    url: String,
}

/// Plays clips through `HTMLAudioElement`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlAudioOutput;

fn playback_error(value: wasm_bindgen::JsValue) -> AudioError {
    AudioError::playback(js_message(&value))
}

impl AudioOutput for HtmlAudioOutput {
    type Clip = WebClip;

    async fn load(&self, audio: Vec<u8>) -> Result<WebClip, AudioError> {
        let parts = Array::of1(&Uint8Array::from(audio.as_slice()));
        let options = BlobPropertyBag::new();
        options.set_type("audio/mpeg");
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(playback_error)?;
        let url = Url::create_object_url_with_blob(&blob).map_err(playback_error)?;

        let element = match HtmlAudioElement::new_with_src(&url) {
            Ok(element) => element,
            Err(e) => {
                let _ = Url::revoke_object_url(&url);
                return Err(playback_error(e));
            }
        };
        let clip = WebClip { element, url };

        // Wait for the audio to be ready
        let ready = Promise::new(&mut |resolve, reject| {
            clip.element.set_oncanplaythrough(Some(&resolve));
            clip.element.set_onerror(Some(&reject));
        });
        let loaded = JsFuture::from(ready).await;
        clip.element.set_oncanplaythrough(None);
        clip.element.set_onerror(None);
        if let Err(e) = loaded {
            self.release(&clip);
            return Err(playback_error(e));
        }
        Ok(clip)
    }

    async fn play_to_end(&self, clip: &WebClip) -> Result<(), AudioError> {
        // Pausing (which `release` does) counts as the end of playback.
        let finished = Promise::new(&mut |resolve, reject| {
            clip.element.set_onended(Some(&resolve));
            clip.element.set_onpause(Some(&resolve));
            clip.element.set_onerror(Some(&reject));
        });

        let started = clip.element.play().map_err(playback_error)?;
        JsFuture::from(started).await.map_err(playback_error)?;
        JsFuture::from(finished).await.map_err(playback_error)?;
        Ok(())
    }

    fn release(&self, clip: &WebClip) {
        let _ = clip.element.pause();
        clip.element.set_current_time(0.0);
        let _ = Url::revoke_object_url(&clip.url);
    }
}
