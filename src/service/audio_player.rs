use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::errors::AudioError;
use crate::models::TtsRequest;
use crate::text::remove_emojis;

/// Issues `POST /api/tts` and returns the audio bytes.
#[allow(async_fn_in_trait)]
pub trait SpeechSynthesizer {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Vec<u8>, AudioError>;
}

/// Turns audio bytes into a playing clip.
#[allow(async_fn_in_trait)]
pub trait AudioOutput {
    type Clip;

    /// Acquires a playable resource for `audio`, waiting until it is ready.
    async fn load(&self, audio: Vec<u8>) -> Result<Self::Clip, AudioError>;

    /// Starts playback and resolves when the clip ends or is released.
    async fn play_to_end(&self, clip: &Self::Clip) -> Result<(), AudioError>;

    /// Stops playback and frees the resource. Called exactly once per clip.
    fn release(&self, clip: &Self::Clip);
}

struct Active<C> {
    ticket: u64,
    clip_id: String,
    clip: Option<Rc<C>>,
}

/// Owns the single "currently playing" clip.
///
/// Every `play` stops the previous clip before acquiring a new one, and each
/// play carries a ticket so a superseded play never releases or clears state
/// that belongs to the clip that replaced it.
pub struct AudioController<S, O: AudioOutput> {
    synthesizer: S,
    output: O,
    current: RefCell<Option<Active<O::Clip>>>,
    next_ticket: Cell<u64>,
}

impl<S: SpeechSynthesizer, O: AudioOutput> AudioController<S, O> {
    pub fn new(synthesizer: S, output: O) -> Self {
        Self {
            synthesizer,
            output,
            current: RefCell::new(None),
            next_ticket: Cell::new(0),
        }
    }

    /// Id of the clip in the playing state, from request until release.
    pub fn playing_clip(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|a| a.clip_id.clone())
    }

    pub fn is_playing(&self, clip_id: &str) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|a| a.clip_id == clip_id)
    }

    pub fn stop(&self) {
        let previous = self.current.borrow_mut().take();
        if let Some(active) = previous {
            debug!("Stopping clip {}", active.clip_id);
            if let Some(clip) = active.clip {
                self.output.release(&clip);
            }
        }
    }

    /// Speaks `text` in `language`. Failures are logged, never returned.
    pub async fn play(&self, clip_id: &str, text: &str, language: &str) {
        self.stop();

        let ticket = self.next_ticket.get() + 1;
        self.next_ticket.set(ticket);
        *self.current.borrow_mut() = Some(Active {
            ticket,
            clip_id: clip_id.to_string(),
            clip: None,
        });

        let request = TtsRequest {
            text: remove_emojis(text),
            language: language.to_uppercase(),
        };

        let audio = match self.synthesizer.synthesize(&request).await {
            Ok(audio) => audio,
            Err(e) => {
                error!("Error generating audio: {e}");
                self.finish(ticket);
                return;
            }
        };
        if !self.owns(ticket) {
            debug!("Clip {clip_id} superseded before loading");
            return;
        }

        let clip = match self.output.load(audio).await {
            Ok(clip) => Rc::new(clip),
            Err(e) => {
                error!("Audio playback error: {e}");
                self.finish(ticket);
                return;
            }
        };
        if !self.attach(ticket, &clip) {
            debug!("Clip {clip_id} superseded while loading");
            self.output.release(&clip);
            return;
        }

        if let Err(e) = self.output.play_to_end(&clip).await {
            warn!("Error playing audio: {e}");
        }
        self.finish(ticket);
    }

    fn owns(&self, ticket: u64) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|a| a.ticket == ticket)
    }

    fn attach(&self, ticket: u64, clip: &Rc<O::Clip>) -> bool {
        match self.current.borrow_mut().as_mut() {
            Some(active) if active.ticket == ticket => {
                active.clip = Some(clip.clone());
                true
            }
            _ => false,
        }
    }

    /// Releases the clip of `ticket` if it is still the current one.
    fn finish(&self, ticket: u64) {
        let finished = {
            let mut current = self.current.borrow_mut();
            if current.as_ref().is_some_and(|a| a.ticket == ticket) {
                current.take()
            } else {
                None
            }
        };
        if let Some(clip) = finished.and_then(|active| active.clip) {
            self.output.release(&clip);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;

    #[derive(Default)]
    struct FakeTts {
        requests: RefCell<Vec<TtsRequest>>,
        fail: bool,
    }

    impl SpeechSynthesizer for FakeTts {
        async fn synthesize(&self, request: &TtsRequest) -> Result<Vec<u8>, AudioError> {
            self.requests.borrow_mut().push(request.clone());
            tokio::task::yield_now().await;
            if self.fail {
                return Err(AudioError::HttpStatus { status: 500, message: "boom".into() });
            }
            Ok(request.text.as_bytes().to_vec())
        }
    }

    struct FakeClip {
        audio: Vec<u8>,
        ended: Notify,
        released: Cell<bool>,
    }

    /// Clips play until the test ends them or the controller releases them.
    #[derive(Default)]
    struct FakeOutput {
        live: Cell<usize>,
        max_live: Cell<usize>,
        clips: RefCell<Vec<Rc<FakeClip>>>,
    }

    impl AudioOutput for Rc<FakeOutput> {
        type Clip = Rc<FakeClip>;

        async fn load(&self, audio: Vec<u8>) -> Result<Self::Clip, AudioError> {
            self.live.set(self.live.get() + 1);
            self.max_live.set(self.max_live.get().max(self.live.get()));
            let clip = Rc::new(FakeClip { audio, ended: Notify::new(), released: Cell::new(false) });
            self.clips.borrow_mut().push(clip.clone());
            Ok(clip)
        }

        async fn play_to_end(&self, clip: &Self::Clip) -> Result<(), AudioError> {
            if !clip.released.get() {
                clip.ended.notified().await;
            }
            Ok(())
        }

        fn release(&self, clip: &Self::Clip) {
            assert!(!clip.released.replace(true), "clip released twice");
            self.live.set(self.live.get() - 1);
            clip.ended.notify_one();
        }
    }

    #[tokio::test]
    async fn sanitizes_text_and_uppercases_language() {
        let output = Rc::new(FakeOutput::default());
        let controller = AudioController::new(FakeTts::default(), output.clone());

        let play = controller.play("m1-original", "Hola 👋", "es");
        let end = async {
            while output.clips.borrow().is_empty() {
                tokio::task::yield_now().await;
            }
            assert!(controller.is_playing("m1-original"));
            let clip = output.clips.borrow()[0].clone();
            clip.ended.notify_one();
        };
        tokio::join!(play, end);

        let requests = controller.synthesizer.requests.borrow();
        assert_eq!(requests[0], TtsRequest { text: "Hola ".into(), language: "ES".into() });
        assert_eq!(output.clips.borrow()[0].audio, b"Hola ".to_vec());
        assert_eq!(controller.playing_clip(), None);
        assert_eq!(output.live.get(), 0);
    }

    #[tokio::test]
    async fn new_play_stops_the_current_clip() {
        let output = Rc::new(FakeOutput::default());
        let controller = AudioController::new(FakeTts::default(), output.clone());

        let first = controller.play("a-original", "first", "en");
        let second = async {
            while output.clips.borrow().is_empty() {
                tokio::task::yield_now().await;
            }
            controller.play("a-translated", "second", "es").await;
        };
        let finish = async {
            while output.clips.borrow().len() < 2 {
                tokio::task::yield_now().await;
            }
            assert!(output.clips.borrow()[0].released.get());
            assert_eq!(controller.playing_clip().as_deref(), Some("a-translated"));
            controller.stop();
        };
        tokio::join!(first, second, finish);

        assert_eq!(output.max_live.get(), 1);
        assert_eq!(output.live.get(), 0);
        assert_eq!(controller.playing_clip(), None);
    }

    #[tokio::test]
    async fn play_superseded_during_synthesis_never_loads() {
        let output = Rc::new(FakeOutput::default());
        let controller = AudioController::new(FakeTts::default(), output.clone());

        let first = controller.play("x", "first", "en");
        let second = async {
            // Lands while the first request is still being synthesized.
            controller.play("y", "second", "en").await;
        };
        let finish = async {
            while output.clips.borrow().is_empty() {
                tokio::task::yield_now().await;
            }
            controller.stop();
        };
        tokio::join!(first, second, finish);

        let clips = output.clips.borrow();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].audio, b"second".to_vec());
        assert_eq!(output.max_live.get(), 1);
    }

    #[tokio::test]
    async fn synthesis_failure_clears_playing_state() {
        let output = Rc::new(FakeOutput::default());
        let tts = FakeTts { fail: true, ..FakeTts::default() };
        let controller = AudioController::new(tts, output.clone());

        controller.play("m-original", "hello", "en").await;

        assert_eq!(controller.playing_clip(), None);
        assert!(output.clips.borrow().is_empty());
    }
}
