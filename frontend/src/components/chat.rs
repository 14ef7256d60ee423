use leptos::ev;
use leptos::prelude::*;

use lingua_chat::models::{LANGUAGES, Message, MessageRole};

use crate::state::AppState;

/// Language selectors, transcript and input for the selected conversation.
#[component]
pub fn ChatArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let is_empty = Memo::new(move |_| state.current().is_none_or(|c| c.messages.is_empty()));

    view! {
        <section class="chat-area">
            // Error banner
            {move || {
                state.error.get().map(|err| {
                    view! {
                        <div class="error-banner">{err}</div>
                    }
                })
            }}

            <LanguageSelectors />

            // Messages
            <div class="messages-container">
                {move || {
                    if is_empty.get() {
                        view! {
                            <div class="empty-state">
                                "No messages yet. Start a conversation!"
                            </div>
                        }.into_any()
                    } else {
                        view! {
                            // Keyed on the text too, so rows re-render as the
                            // stream fills them in.
                            <For
                                each=move || state.current().map(|c| c.messages).unwrap_or_default()
                                key=|m| (m.id.clone(), m.original_text.clone(), m.translated_text.clone())
                                let:msg
                            >
                                <MessageBubble message=msg />
                            </For>
                        }.into_any()
                    }
                }}
            </div>

            <ChatInput />
        </section>
    }
}

#[component]
fn LanguageSelectors() -> impl IntoView {
    let state = expect_context::<AppState>();

    let source = move || state.current().map(|c| c.source_language).unwrap_or_default();
    let target = move || state.current().map(|c| c.target_language).unwrap_or_default();

    let on_source = move |ev: ev::Event| {
        state.set_languages(event_target_value(&ev), target());
    };
    let on_target = move |ev: ev::Event| {
        state.set_languages(source(), event_target_value(&ev));
    };

    view! {
        <div class="language-selectors">
            <select prop:value=source on:change=on_source>
                <LanguageOptions />
            </select>
            <select prop:value=target on:change=on_target>
                <LanguageOptions />
            </select>
        </div>
    }
}

#[component]
fn LanguageOptions() -> impl IntoView {
    LANGUAGES
        .iter()
        .map(|lang| view! { <option value=lang.code>{lang.name}</option> })
        .collect_view()
}

/// One transcript entry: the primary line above the translated line, each
/// with its own speaker button.
#[component]
fn MessageBubble(message: Message) -> impl IntoView {
    let css_class = match message.role {
        MessageRole::User => "message user",
        MessageRole::Assistant => "message assistant",
    };
    let time = message
        .created_at
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S")
        .to_string();

    view! {
        <div class=css_class>
            <div class="message-line">
                <div>{message.original_text.clone()}</div>
                <SpeakerButton
                    clip_id=message.original_clip_id()
                    text=message.original_text.clone()
                    translated=false
                />
            </div>
            <div class="message-line translated">
                <div>{message.translated_text.clone()}</div>
                <SpeakerButton
                    clip_id=message.translated_clip_id()
                    text=message.translated_text.clone()
                    translated=true
                />
            </div>
            <div class="timestamp">{time}</div>
        </div>
    }
}

/// Plays one line in the conversation's source or target language.
#[component]
fn SpeakerButton(clip_id: String, text: String, translated: bool) -> impl IntoView {
    let state = expect_context::<AppState>();

    let playing_id = clip_id.clone();
    let is_playing = move || state.playing_clip.get().as_deref() == Some(playing_id.as_str());

    let on_click = move |_| {
        // Languages are read at click time; the row is not keyed on them.
        let language = state.conversations.with_untracked(|c| {
            c.selected().map(|conv| {
                if translated {
                    conv.target_language.clone()
                } else {
                    conv.source_language.clone()
                }
            })
        });
        if let Some(language) = language {
            state.play_clip(clip_id.clone(), text.clone(), language);
        }
    };

    view! {
        <button
            type="button"
            class="speaker-btn"
            class:playing=is_playing
            title="Play audio"
            on:click=on_click
        >
            "🔊"
        </button>
    }
}

/// Chat input form with text field and send button.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (input, set_input) = signal(String::new());

    let is_sending = move || state.is_loading.get();

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        let text = input.get_untracked().trim().to_string();
        if text.is_empty() || state.is_loading.get_untracked() {
            return;
        }
        state.send_message(text, move || set_input.set(String::new()));
    };

    view! {
        <form class="input-area" on:submit=on_submit>
            <input
                type="text"
                placeholder="Type your message..."
                prop:value=input
                on:input=move |ev| {
                    set_input.set(event_target_value(&ev));
                }
                disabled=is_sending
            />
            <button class="send-btn" type="submit" disabled=is_sending>
                {move || if is_sending() { "Sending..." } else { "Send" }}
            </button>
        </form>
    }
}
