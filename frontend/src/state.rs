use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;

use lingua_chat::ChatError;
use lingua_chat::models::Conversation;
use lingua_chat::service::{AudioController, ChatSession, ConversationController};

use crate::api::{FetchClient, api_config};
use crate::audio::HtmlAudioOutput;
use crate::storage::LocalStorageStore;

pub type Controller = ConversationController<LocalStorageStore>;

type Session = ChatSession<FetchClient>;
type Audio = AudioController<FetchClient, HtmlAudioOutput>;

// Browser-side I/O handles. They hold JS objects, so they live on the main
// thread rather than in reactive state.
thread_local! {
    static SESSION: Rc<Session> = Rc::new(ChatSession::new(FetchClient::new(api_config())));
    static AUDIO: Rc<Audio> =
        Rc::new(AudioController::new(FetchClient::new(api_config()), HtmlAudioOutput));
}

fn session() -> Rc<Session> {
    SESSION.with(Rc::clone)
}

fn audio() -> Rc<Audio> {
    AUDIO.with(Rc::clone)
}

/// Shared application state, provided via Leptos context.
#[derive(Clone, Copy)]
pub struct AppState {
    // --- Read signals (for components to subscribe to) ---
    pub conversations: ReadSignal<Controller>,
    pub is_loading: ReadSignal<bool>,
    pub playing_clip: ReadSignal<Option<String>>,
    pub error: ReadSignal<Option<String>>,

    // --- Write signals (for mutating state) ---
    set_conversations: WriteSignal<Controller>,
    set_is_loading: WriteSignal<bool>,
    set_playing_clip: WriteSignal<Option<String>>,
    pub set_error: WriteSignal<Option<String>>,
}

impl AppState {
    /// Load stored conversations, create the state and provide it in the
    /// current Leptos context.
    pub fn provide() -> Self {
        let controller = Controller::load(LocalStorageStore).unwrap_or_else(|e| {
            log::error!("Failed to load conversations: {e}");
            Controller::with_conversations(LocalStorageStore, Vec::new())
        });

        let (conversations, set_conversations) = signal(controller);
        let (is_loading, set_is_loading) = signal(false);
        let (playing_clip, set_playing_clip) = signal(None::<String>);
        let (error, set_error) = signal(None::<String>);

        let state = Self {
            conversations,
            is_loading,
            playing_clip,
            error,
            set_conversations,
            set_is_loading,
            set_playing_clip,
            set_error,
        };

        provide_context(state);
        state
    }

    /// The selected conversation, re-read from the store on every call.
    pub fn current(&self) -> Option<Conversation> {
        self.conversations.with(|c| c.selected().cloned())
    }

    pub fn selected_id(&self) -> Option<String> {
        self.conversations.with(|c| c.selected_id().map(str::to_string))
    }

    fn mutate(&self, action: &str, f: impl FnOnce(&mut Controller) -> Result<(), lingua_chat::StoreError>) {
        let set_error = self.set_error;
        self.set_conversations.update(|c| {
            if let Err(e) = f(c) {
                log::error!("Failed to {action}: {e}");
                set_error.set(Some(e.to_string()));
            }
        });
    }

    /// Abandons whatever the current view was doing: the in-flight send and
    /// any playing clip.
    fn leave_current(&self) {
        session().cancel();
        audio().stop();
        self.set_playing_clip.set(None);
    }

    pub fn create_conversation(&self) {
        self.leave_current();
        self.mutate("create conversation", |c| c.create().map(|_| ()));
    }

    pub fn select_conversation(&self, id: String) {
        if self.conversations.with_untracked(|c| c.selected_id() == Some(id.as_str())) {
            return;
        }
        self.leave_current();
        self.set_error.set(None);
        self.mutate("select conversation", |c| c.select(&id).map(|_| ()));
    }

    pub fn delete_conversation(&self, id: String) {
        if self.conversations.with_untracked(|c| c.selected_id() == Some(id.as_str())) {
            self.leave_current();
        }
        self.mutate("delete conversation", |c| c.delete(&id));
    }

    pub fn set_languages(&self, source: String, target: String) {
        let Some(id) = self.conversations.with_untracked(|c| c.selected_id().map(str::to_string))
        else {
            return;
        };
        self.mutate("change languages", |c| c.set_languages(&id, &source, &target));
    }

    /// Streams one turn into the selected conversation; `on_sent` runs once
    /// the reply has fully arrived.
    pub fn send_message(&self, text: String, on_sent: impl FnOnce() + 'static) {
        let Some(conversation) = self.conversations.with_untracked(|c| c.selected().cloned()) else {
            return;
        };
        let session = session();
        if session.is_loading() {
            // A cancelled send holds the session until its task is polled again.
            let busy = ChatError::Busy.to_string();
            log::warn!("{busy}");
            self.set_error.set(Some(busy));
            return;
        }

        let set_conversations = self.set_conversations;
        let set_is_loading = self.set_is_loading;
        let set_error = self.set_error;
        set_is_loading.set(true);
        set_error.set(None);

        spawn_local(async move {
            let id = conversation.id.clone();
            let result = session
                .send(&conversation, &text, |messages| {
                    set_conversations.update(|c| {
                        if let Err(e) = c.update_messages(&id, messages) {
                            log::error!("Failed to store conversation {id}: {e}");
                        }
                    });
                })
                .await;
            set_is_loading.set(false);

            match result {
                Ok(()) => on_sent(),
                Err(ChatError::Cancelled { assistant_id }) => {
                    set_conversations.update(|c| {
                        // The conversation may have been deleted meanwhile.
                        if let Err(e) = c.discard_message(&id, &assistant_id) {
                            log::debug!("Could not discard cancelled reply in {id}: {e}");
                        }
                    });
                }
                Err(e) if e.is_rejected() => {}
                Err(e) => set_error.set(Some(e.to_string())),
            }
        });
    }

    pub fn play_clip(&self, clip_id: String, text: String, language: String) {
        let audio = audio();
        let set_playing_clip = self.set_playing_clip;
        set_playing_clip.set(Some(clip_id.clone()));

        spawn_local(async move {
            audio.play(&clip_id, &text, &language).await;
            // A newer clip may have taken over while this one played.
            set_playing_clip.set(audio.playing_clip());
        });
    }
}
