use std::io::Write;
use std::path::PathBuf;
use std::pin::pin;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use lingua_chat::client::{FileAudioOutput, HttpClient};
use lingua_chat::config::{ApiConfig, Environment, API_URL_VAR};
use lingua_chat::db::JsonFileStore;
use lingua_chat::models::{language_name, Message, MessageRole, LANGUAGES, PENDING_TRANSLATION};
use lingua_chat::service::{AudioController, ChatSession, ConversationController};

const DATA_DIR_VAR: &str = "LINGUA_DATA_DIR";

const HELP: &str = "\
Type a message to send it in the selected conversation.
  /new                          start a new conversation
  /list                         list conversations
  /select <n>                   switch to conversation n
  /delete <n>                   delete conversation n
  /lang <source> <target>       set the language pair (en, es, de, ru)
  /show                         print the selected transcript
  /speak <n> [original|translated]
                                read message n aloud
  /help                         show this help
  /quit                         exit
Ctrl-C cancels a reply or stops playback.";

#[derive(Parser)]
#[command(name = "lingua")]
#[command(about = "Chat with the lingua assistant, translated as you go", long_about = None)]
struct Cli {
    /// Backend base URL (overrides LINGUA_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Where conversations and audio clips are kept (overrides LINGUA_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

type Controller = ConversationController<JsonFileStore>;
type Session = ChatSession<HttpClient>;
type Audio = AudioController<HttpClient, FileAudioOutput>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // stdout carries the transcript, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lingua_chat=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = ApiConfig::resolve(
        cli.api_url.as_deref(),
        std::env::var(API_URL_VAR).ok().as_deref(),
        Environment::Local,
    );
    let data_dir = resolve_data_dir(cli.data_dir)?;
    info!("Data directory: {}", data_dir.display());

    let client = HttpClient::new(config).context("Failed to build HTTP client")?;
    let session = ChatSession::new(client.clone());
    let audio = AudioController::new(client, FileAudioOutput::from_env(data_dir.join("audio")));
    let mut controller = ConversationController::load(JsonFileStore::in_dir(&data_dir))
        .context("Failed to load conversations")?;

    println!("lingua - type /help for commands");
    print_conversations(&controller);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&controller);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome = if let Some(command) = line.strip_prefix('/') {
            match run_command(command, &mut controller, &audio).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            send(line, &session, &mut controller).await
        };

        if let Err(e) = outcome {
            println!("! {e}");
        }
    }

    audio.stop();
    Ok(())
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = explicit.or_else(|| std::env::var_os(DATA_DIR_VAR).map(PathBuf::from)) {
        return Ok(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("lingua-chat"))
        .context("Could not determine a data directory; set LINGUA_DATA_DIR")
}

enum Flow {
    Continue,
    Quit,
}

async fn run_command(command: &str, controller: &mut Controller, audio: &Audio) -> anyhow::Result<Flow> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (name, args.as_slice()) {
        ("quit" | "exit" | "q", _) => return Ok(Flow::Quit),
        ("help" | "h", _) => println!("{HELP}"),
        ("new", _) => {
            let conversation = controller.create()?;
            println!("Started {}", conversation.title);
        }
        ("list" | "ls", _) => print_conversations(controller),
        ("select", [n]) => {
            let id = conversation_at(controller, n)?;
            let conversation = controller.select(&id)?;
            println!("Switched to {}", conversation.title);
            print_transcript(&conversation.messages);
        }
        ("delete", [n]) => {
            let id = conversation_at(controller, n)?;
            controller.delete(&id)?;
            println!("Deleted");
        }
        ("lang", [source, target]) => {
            for code in [source, target] {
                if language_name(code).is_none() {
                    let known: Vec<_> = LANGUAGES.iter().map(|l| l.code).collect();
                    bail!("Unknown language '{code}', expected one of {}", known.join(", "));
                }
            }
            let id = selected_id(controller)?;
            controller.set_languages(&id, source, target)?;
        }
        ("show", _) => {
            let conversation = controller.selected().context("No conversation selected")?;
            print_transcript(&conversation.messages);
        }
        ("speak", [n, rest @ ..]) => {
            let conversation = controller.selected().context("No conversation selected")?;
            let index: usize = n.parse().context("Message number expected")?;
            let message = index
                .checked_sub(1)
                .and_then(|i| conversation.messages.get(i))
                .context("No such message")?;
            let (clip_id, text, language) = match rest {
                [] | ["original"] => (
                    message.original_clip_id(),
                    &message.original_text,
                    &conversation.source_language,
                ),
                ["translated"] => (
                    message.translated_clip_id(),
                    &message.translated_text,
                    &conversation.target_language,
                ),
                _ => bail!("Usage: /speak <n> [original|translated]"),
            };
            tokio::select! {
                _ = audio.play(&clip_id, text, language) => {}
                _ = tokio::signal::ctrl_c() => audio.stop(),
            }
        }
        _ => bail!("Unknown command '/{command}', try /help"),
    }
    Ok(Flow::Continue)
}

async fn send(text: &str, session: &Session, controller: &mut Controller) -> anyhow::Result<()> {
    if controller.selected().is_none() {
        controller.create()?;
    }
    let conversation = controller
        .selected()
        .cloned()
        .context("No conversation selected")?;
    let id = conversation.id.clone();
    let mut printer = StreamPrinter::default();

    let result = {
        let turn = session.send(&conversation, text, |messages| {
            if let Err(e) = controller.update_messages(&id, messages) {
                error!("Failed to store conversation {id}: {e}");
            }
            printer.render(messages);
        });
        let mut turn = pin!(turn);

        // After Ctrl-C the turn still runs to its `Cancelled` result.
        tokio::select! {
            result = &mut turn => result,
            _ = interrupted(session) => turn.await,
        }
    };
    println!();

    match result {
        Ok(()) => Ok(()),
        Err(e) => match e.cancelled_placeholder() {
            Some(assistant_id) => {
                controller.discard_message(&id, assistant_id)?;
                println!("(cancelled)");
                Ok(())
            }
            None => Err(e.into()),
        },
    }
}

async fn interrupted(session: &Session) {
    if tokio::signal::ctrl_c().await.is_ok() {
        session.cancel();
    } else {
        std::future::pending::<()>().await;
    }
}

/// Prints a turn progressively from the snapshots the session publishes.
#[derive(Default)]
struct StreamPrinter {
    user_shown: bool,
    reply_printed: usize,
    translation_shown: bool,
}

impl StreamPrinter {
    fn render(&mut self, messages: &[Message]) {
        let [.., user, assistant] = messages else {
            return;
        };
        if assistant.role != MessageRole::Assistant {
            // Rolled back, the placeholder is gone.
            return;
        }

        let mut out = std::io::stdout().lock();
        if !self.user_shown && user.translated_text != PENDING_TRANSLATION {
            self.user_shown = true;
            let _ = writeln!(out, "  you: {}\n       {}", user.original_text, user.translated_text);
        }

        let reply = assistant.original_text.as_str();
        match reply.get(self.reply_printed..) {
            Some(fresh) if !fresh.is_empty() => {
                if self.reply_printed == 0 {
                    let _ = write!(out, "  ai:  ");
                }
                let _ = write!(out, "{fresh}");
                self.reply_printed = reply.len();
            }
            Some(_) => {}
            None => {
                // The final text differs from what was streamed.
                let _ = write!(out, "\n  ai:  {reply}");
                self.reply_printed = reply.len();
            }
        }

        if !self.translation_shown && assistant.translated_text != PENDING_TRANSLATION {
            self.translation_shown = true;
            let _ = write!(out, "\n       {}", assistant.translated_text);
        }
        let _ = out.flush();
    }
}

fn conversation_at(controller: &Controller, n: &str) -> anyhow::Result<String> {
    let index: usize = n.parse().context("Conversation number expected")?;
    index
        .checked_sub(1)
        .and_then(|i| controller.conversations().get(i))
        .map(|c| c.id.clone())
        .context("No such conversation")
}

fn selected_id(controller: &Controller) -> anyhow::Result<String> {
    controller
        .selected_id()
        .map(str::to_string)
        .context("No conversation selected")
}

fn prompt(controller: &Controller) {
    match controller.selected() {
        Some(c) => print!("[{} {}→{}] > ", c.title, c.source_language, c.target_language),
        None => print!("> "),
    }
    let _ = std::io::stdout().flush();
}

fn print_conversations(controller: &Controller) {
    if controller.conversations().is_empty() {
        println!("No conversations yet");
        return;
    }
    for (i, c) in controller.conversations().iter().enumerate() {
        let marker = if controller.selected_id() == Some(c.id.as_str()) { "*" } else { " " };
        println!(
            "{marker}{:>3}. {} ({} messages, {}→{}, updated {})",
            i + 1,
            c.title,
            c.messages.len(),
            c.source_language,
            c.target_language,
            c.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_transcript(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages yet. Start a conversation!");
    }
    for (i, m) in messages.iter().enumerate() {
        let who = match m.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "ai ",
        };
        println!(
            "{:>3}. {who} [{}] {}\n          {}",
            i + 1,
            m.created_at.format("%H:%M:%S"),
            m.original_text,
            m.translated_text
        );
    }
}
