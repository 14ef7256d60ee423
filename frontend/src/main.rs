mod api;
mod audio;
mod components;
mod state;
mod storage;

use leptos::mount::mount_to_body;
use leptos::prelude::*;

use components::chat::ChatArea;
use components::sidebar::Sidebar;
use state::AppState;

/// Root application component.
#[component]
fn App() -> impl IntoView {
    let state = AppState::provide();
    let has_selection = Memo::new(move |_| state.selected_id().is_some());

    view! {
        <div class="app-container">
            <Sidebar />
            <main class="main-area">
                <h1>"Language Assistant"</h1>
                {move || {
                    if has_selection.get() {
                        view! { <ChatArea /> }.into_any()
                    } else {
                        view! {
                            <div class="empty-state">
                                <p>"No conversation selected."</p>
                                <button on:click=move |_| state.create_conversation()>
                                    "Start New Conversation"
                                </button>
                            </div>
                        }
                        .into_any()
                    }
                }}
            </main>
        </div>
    }
}

fn main() {
    console_log::init_with_level(log::Level::Debug).expect("Failed to init logger");
    mount_to_body(App);
}
