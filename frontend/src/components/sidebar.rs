use leptos::prelude::*;

use crate::state::AppState;

/// Sidebar showing the conversation list and the "new conversation" button.
#[component]
pub fn Sidebar() -> impl IntoView {
    let state = expect_context::<AppState>();

    let on_new = move |_| state.create_conversation();
    let is_empty = Memo::new(move |_| state.conversations.with(|c| c.conversations().is_empty()));

    view! {
        <aside class="sidebar">
            <div class="sidebar-header">
                <h2>"Conversations"</h2>
                <button class="new-chat-btn" title="New Conversation" on:click=on_new>
                    "+"
                </button>
            </div>
            <div class="conversation-list">
                {move || {
                    if is_empty.get() {
                        view! {
                            <div style="padding:1rem;color:var(--text-secondary);font-size:0.85rem">
                                "No conversations yet"
                            </div>
                        }.into_any()
                    } else {
                        view! {
                            <For
                                each=move || {
                                    state.conversations.with(|c| {
                                        c.conversations()
                                            .iter()
                                            .map(|conv| (conv.id.clone(), conv.title.clone()))
                                            .collect::<Vec<_>>()
                                    })
                                }
                                key=|(id, _)| id.clone()
                                let:entry
                            >
                                {
                                    let (id, title) = entry;
                                    let id_active = id.clone();
                                    let id_select = id.clone();
                                    view! {
                                        <div
                                            class="conversation-item"
                                            class:active=move || {
                                                state.selected_id().as_deref() == Some(id_active.as_str())
                                            }
                                        >
                                            <div
                                                class="conversation-title"
                                                on:click=move |_| state.select_conversation(id_select.clone())
                                            >
                                                {title}
                                            </div>
                                            <button
                                                class="delete-btn"
                                                title="Delete Conversation"
                                                on:click=move |ev| {
                                                    ev.stop_propagation();
                                                    state.delete_conversation(id.clone());
                                                }
                                            >
                                                "🗑"
                                            </button>
                                        </div>
                                    }
                                }
                            </For>
                        }.into_any()
                    }
                }}
            </div>
        </aside>
    }
}
