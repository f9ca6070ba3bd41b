#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use yansi::Paint;

use crate::domain::models::Action;
use crate::domain::models::BackendBox;
use crate::domain::models::ChatSession;
use crate::domain::models::Composer;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::SlashCommand;
use crate::domain::models::Theme;
use crate::domain::services::actions::help_text;
use crate::domain::services::actions::read_attachment;
use crate::domain::services::actions::resolve_model_choice;
use crate::domain::services::actions::resolve_models;
use crate::domain::services::SessionStore;

pub fn format_sessions(sessions: &[ChatSession], current_id: &str) -> String {
    return sessions
        .iter()
        .enumerate()
        .map(|(idx, session)| {
            let marker = if session.id == current_id { "*" } else { "-" };
            let count = session.messages.len();
            let noun = if count == 1 { "message" } else { "messages" };
            return format!("{marker} ({}) {} [{count} {noun}]", idx + 1, session.title);
        })
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn format_models(models: &[String], active: &str) -> String {
    return models
        .iter()
        .enumerate()
        .map(|(idx, model)| {
            let marker = if model == active { "*" } else { "-" };
            return format!("{marker} ({}) {model}", idx + 1);
        })
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn format_message(idx: usize, message: &Message) -> String {
    let author = match (&message.role, &message.model) {
        (Role::Assistant, Some(model)) => format!("{} ({model})", message.role),
        _ => message.role.to_string(),
    };

    let mut res = format!("({}) {author}: {}", idx + 1, message.content);
    let images = message.images().len();
    if images > 0 {
        res = format!("{res} [{images} image(s)]");
    }

    return res;
}

fn paint_author(theme: Theme, role: &Role, text: String) -> Paint<String> {
    return match (theme, role) {
        (_, Role::User) => Paint::new(text).bold(),
        (Theme::Dark, Role::Assistant) => Paint::cyan(text),
        (Theme::Light, Role::Assistant) => Paint::blue(text),
        (_, Role::System) => Paint::new(text).dimmed(),
    };
}

fn print_notice(text: &str) {
    println!("{}", Paint::new(text).dimmed());
}

fn print_error(text: &str) {
    println!("{}", Paint::red(text));
}

fn print_prompt() {
    print!("{} ", Paint::new(">").bold());
    let _ = std::io::stdout().flush();
}

/// Prints generation progress. Chunks are only echoed for the session on
/// screen, everything else is summarized in a single line. Input refused by a
/// busy session goes back into the shared composer.
fn spawn_event_printer(
    store: SessionStore,
    composer: Arc<Mutex<Composer>>,
    mut rx: mpsc::UnboundedReceiver<Event>,
) -> JoinHandle<()> {
    return tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let current_id = store.current_id().await;
            let theme = store.theme().await;

            match event {
                Event::GenerationStarted { session_id, .. } => {
                    if session_id == current_id {
                        let author = "assistant: ".to_string();
                        print!("{}", paint_author(theme, &Role::Assistant, author));
                    }
                }
                Event::GenerationChunk {
                    session_id, text, ..
                } => {
                    if session_id == current_id {
                        print!("{}", paint_author(theme, &Role::Assistant, text));
                        let _ = std::io::stdout().flush();
                    }
                }
                Event::GenerationFinished { session_id, .. } => {
                    if session_id == current_id {
                        println!();
                    } else if let Some(session) = store.get(&session_id).await {
                        print_notice(&format!("Reply finished in \"{}\".", session.title));
                    }
                    print_prompt();
                }
                Event::GenerationFailed { session_id, error } => {
                    if session_id == current_id {
                        println!();
                        print_error(&format!("Error: {error}"));
                    } else if let Some(session) = store.get(&session_id).await {
                        print_error(&format!(
                            "Reply failed in \"{}\": {error}",
                            session.title
                        ));
                    }
                    print_prompt();
                }
                Event::SendSkipped {
                    composer: returned,
                    ..
                } => {
                    print_error(
                        "Your message was not sent, a reply is still being written. \
                         It is back in the composer.",
                    );
                    composer.lock().await.restore(returned);
                    print_prompt();
                }
                Event::TitleChanged { title, .. } => {
                    tracing::debug!(title = title, "Session title changed");
                }
            }
        }
    });
}

struct Repl {
    store: SessionStore,
    backend: BackendBox,
    actions: mpsc::UnboundedSender<Action>,
    composer: Arc<Mutex<Composer>>,
}

impl Repl {
    async fn print_session(&self) {
        let session = self.store.current().await;
        let theme = self.store.theme().await;

        println!("{}", Paint::new(format!("# {}", session.title)).underline());
        for (idx, message) in session.messages.iter().enumerate() {
            let line = format_message(idx, message);
            println!("{}", paint_author(theme, &message.role, line));
        }
    }

    async fn session_at(&self, idx: usize) -> Option<ChatSession> {
        return self.store.list().await.get(idx).cloned();
    }

    /// Reports a generation in flight for the session, if there is one.
    fn is_busy(&self, session_id: &str) -> bool {
        if !self.store.is_generating(session_id) {
            return false;
        }

        let state = self.store.generation_state(session_id);
        print_error(&format!("A reply is still {state} for this session."));
        return true;
    }

    fn dispatch(&self, action: Action) -> Result<()> {
        self.actions.send(action)?;
        return Ok(());
    }

    async fn send(&self, text: &str) -> Result<()> {
        let mut pending = self.composer.lock().await;
        pending.text = text.to_string();
        if !pending.is_sendable() {
            return Ok(());
        }

        let session_id = self.store.current_id().await;
        if self.is_busy(&session_id) {
            return Ok(());
        }

        let composer = std::mem::take(&mut *pending);
        return self.dispatch(Action::Send {
            session_id,
            composer,
        });
    }

    async fn switch(&self, command: &SlashCommand) -> Result<()> {
        let idx = match command.index_and_text() {
            Some((idx, _)) => idx,
            None => {
                print_error("Pass the number of a session from /sessions.");
                return Ok(());
            }
        };

        match self.session_at(idx).await {
            Some(session) => {
                self.store.set_current(&session.id).await;
                self.print_session().await;
            }
            None => print_error(&format!("{} is not a valid session number.", idx + 1)),
        }

        return Ok(());
    }

    async fn delete(&self, command: &SlashCommand) -> Result<()> {
        let session = if command.rest().is_empty() {
            Some(self.store.current().await)
        } else {
            match command.index_and_text() {
                Some((idx, _)) => self.session_at(idx).await,
                None => None,
            }
        };

        match session {
            Some(session) => {
                self.store.delete(&session.id).await;
                print_notice(&format!("Deleted \"{}\".", session.title));
                self.print_session().await;
            }
            None => print_error("Pass the number of a session from /sessions."),
        }

        return Ok(());
    }

    async fn edit(&self, command: &SlashCommand) -> Result<()> {
        let (idx, text) = match command.index_and_text() {
            Some(res) => res,
            None => {
                print_error("Usage: /edit [MESSAGE_NUMBER] [TEXT]");
                return Ok(());
            }
        };

        let session = self.store.current().await;
        if self.is_busy(&session.id) {
            return Ok(());
        }

        let message = match session.messages.get(idx) {
            Some(message) => message,
            None => {
                print_error(&format!("{} is not a valid message number.", idx + 1));
                return Ok(());
            }
        };

        return self.dispatch(Action::Edit {
            session_id: session.id.to_string(),
            message_id: message.id.to_string(),
            content: text,
        });
    }

    async fn regenerate(&self) -> Result<()> {
        let session = self.store.current().await;
        if self.is_busy(&session.id) {
            return Ok(());
        }
        if !session.last_is_assistant() {
            print_error("There is no reply to regenerate.");
            return Ok(());
        }

        return self.dispatch(Action::Regenerate {
            session_id: session.id,
        });
    }

    async fn model(&self, command: &SlashCommand) -> Result<()> {
        let session = self.store.current().await;
        let default_model = self.store.default_model().await;

        if command.rest().is_empty() {
            print_notice(&format!("Active model: {}", session.model_or(&default_model)));
            return Ok(());
        }

        let models = resolve_models(&self.backend, &default_model).await;
        match resolve_model_choice(&models, command.rest()) {
            Ok(model) => {
                self.store.set_model(&session.id, &model).await;
                print_notice(&format!("{model} has entered the chat."));
            }
            Err(err) => print_error(&err.to_string()),
        }

        return Ok(());
    }

    async fn models(&self) {
        let session = self.store.current().await;
        let default_model = self.store.default_model().await;
        let models = resolve_models(&self.backend, &default_model).await;

        println!("{}", format_models(&models, session.model_or(&default_model)));
    }

    async fn attach(&self, command: &SlashCommand) {
        match read_attachment(command.rest()).await {
            Ok(url) => {
                let mut pending = self.composer.lock().await;
                pending.attach(url);
                print_notice(&format!(
                    "Attached {}. {} image(s) will go with your next message.",
                    command.rest(),
                    pending.images.len()
                ));
            }
            Err(err) => print_error(&err.to_string()),
        }
    }

    async fn detach(&self, command: &SlashCommand) {
        let mut pending = self.composer.lock().await;
        if command.rest().is_empty() {
            let count = pending.detach_all();
            print_notice(&format!("Removed {count} attachment(s)."));
            return;
        }

        let idx = match command.index_and_text() {
            Some((idx, _)) => idx,
            None => {
                print_error("Pass the number of a pending attachment.");
                return;
            }
        };

        match pending.detach(idx) {
            Some(_) => print_notice(&format!(
                "Removed attachment {}. {} image(s) will go with your next message.",
                idx + 1,
                pending.images.len()
            )),
            None => print_error(&format!("{} is not a valid attachment number.", idx + 1)),
        }
    }

    /// Handles one line of input. Returns false when the user asked to quit.
    async fn handle_line(&self, line: &str) -> Result<bool> {
        let command = match SlashCommand::parse(line) {
            Some(command) => command,
            None => {
                self.send(line).await?;
                return Ok(true);
            }
        };

        if command.is_quit() {
            return Ok(false);
        }

        if command.is_help() {
            println!("{}", help_text());
        } else if command.is_new() {
            self.store.create_session().await;
            self.print_session().await;
        } else if command.is_sessions() {
            let sessions = self.store.list().await;
            println!("{}", format_sessions(&sessions, &self.store.current_id().await));
        } else if command.is_switch() {
            self.switch(&command).await?;
        } else if command.is_delete() {
            self.delete(&command).await?;
        } else if command.is_rename() {
            let id = self.store.current_id().await;
            self.store.rename(&id, command.rest()).await;
            print_notice(&format!("Renamed to \"{}\".", command.rest()));
        } else if command.is_edit() {
            self.edit(&command).await?;
        } else if command.is_regenerate() {
            self.regenerate().await?;
        } else if command.is_model_list() {
            self.models().await;
        } else if command.is_model_set() {
            self.model(&command).await?;
        } else if command.is_system() {
            let id = self.store.current_id().await;
            self.store.set_system_instruction(&id, command.rest()).await;
            print_notice("System instruction updated.");
        } else if command.is_stream_toggle() {
            let id = self.store.current_id().await;
            if let Some(enabled) = self.store.toggle_streaming(&id).await {
                let state = if enabled { "on" } else { "off" };
                print_notice(&format!("Streaming is {state}."));
            }
        } else if command.is_attach() {
            self.attach(&command).await;
        } else if command.is_detach() {
            self.detach(&command).await;
        } else if command.is_theme_toggle() {
            let theme = self.store.toggle_theme().await;
            print_notice(&format!("Switched to the {theme} theme."));
        }

        return Ok(true);
    }
}

pub async fn start(
    store: SessionStore,
    backend: BackendBox,
    actions: mpsc::UnboundedSender<Action>,
    events: mpsc::UnboundedReceiver<Event>,
) -> Result<()> {
    let composer = Arc::new(Mutex::new(Composer::default()));
    let printer = spawn_event_printer(store.clone(), composer.clone(), events);
    let repl = Repl {
        store,
        backend,
        actions,
        composer,
    };

    repl.print_session().await;
    print_notice("Type /help for a list of commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };

        if !repl.handle_line(&line).await? {
            break;
        }
    }

    printer.abort();
    return Ok(());
}
