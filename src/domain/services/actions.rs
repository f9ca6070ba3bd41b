#[cfg(test)]
#[path = "actions_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::GenerationService;
use crate::domain::models::Action;
use crate::domain::models::BackendBox;
use crate::domain::models::Event;
use crate::domain::models::GenerationOutcome;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /new (/n) - Starts a new chat session and makes it current.
- /sessions (/ls) - Lists all sessions. The current one is marked with a star.
- /switch (/s) [SESSION_NUMBER] - Switches to a session from /sessions.
- /delete (/d) [SESSION_NUMBER?] - Deletes a session, or the current one when no number is given.
- /rename [TITLE] - Renames the current session.
- /edit (/e) [MESSAGE_NUMBER] [TEXT] - Replaces a message and drops everything after it. Editing one of your own messages generates a new reply.
- /regenerate /regen (/r) - Replaces the last reply with a new one.
- /modellist /models (/ml) - Lists all available models.
- /model (/m) [MODEL_NAME,MODEL_INDEX?] - Sets the model of the current session, using either the model name or the index from /modellist. Prints the active model when no argument is given.
- /system [TEXT?] - Sets the system instruction of the current session. An empty instruction clears it.
- /stream - Toggles streamed responses for the current session.
- /attach (/a) [PATH] - Attaches an image to the next message.
- /detach [IMAGE_NUMBER?] - Removes a pending attachment, or all of them when no number is given.
- /theme - Toggles between the light and dark theme.
- /quit /exit (/q) - Exit Synapse.
- /help (/h) - Provides this help menu.

Anything that isn't a command is sent to the current session. Replies keep streaming in the background when you switch sessions.
        "#;

    return text.trim().to_string();
}

/// Models offered for selection. The stored default leads the list when the
/// backend doesn't know about it.
pub async fn resolve_models(backend: &BackendBox, default_model: &str) -> Vec<String> {
    let mut models = backend.list_models().await;
    if !default_model.is_empty() && !models.iter().any(|e| return e == default_model) {
        models.insert(0, default_model.to_string());
    }

    return models;
}

/// Resolves `/model` input against a model list. Numbers are one based
/// indexes, anything else is taken as a model name.
pub fn resolve_model_choice(models: &[String], choice: &str) -> Result<String> {
    let choice = choice.trim();
    if choice.is_empty() {
        bail!("You must specify a model name or index with `/model` or `/m`. Run `/help` for more details.");
    }

    if let Ok(idx) = choice.parse::<usize>() {
        if idx < 1 || idx > models.len() {
            bail!(format!("{idx} is not a valid index from the model list."));
        }
        return Ok(models[idx - 1].to_string());
    }

    if !models.iter().any(|e| return e == choice) {
        tracing::warn!(model = choice, "Model is not in the advertised list");
    }

    return Ok(choice.to_string());
}

fn mime_type(file_path: &path::Path) -> Result<&'static str> {
    let ext = file_path
        .extension()
        .map(|e| return e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    return match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => bail!(format!(
            "Unsupported attachment {}. Only png, jpeg, gif and webp images can be attached.",
            file_path.display()
        )),
    };
}

/// Reads an image from disk into a `data:` URL suitable for a message.
pub async fn read_attachment(file_path: &str) -> Result<String> {
    let file_path = path::PathBuf::from(file_path);
    let mime = mime_type(&file_path)?;
    let bytes = fs::read(&file_path).await?;

    return Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)));
}

fn log_outcome(session_id: &str, outcome: &GenerationOutcome) {
    let state = outcome.state().to_string();
    match outcome {
        GenerationOutcome::Failed { error, .. } => {
            tracing::warn!(
                session_id = session_id,
                state = state,
                error = error,
                "Action failed"
            );
        }
        _ => {
            tracing::debug!(session_id = session_id, state = state, "Action done");
        }
    }
}

async fn run_action(generation: GenerationService, action: Action) -> GenerationOutcome {
    let session_id = action.session_id().to_string();
    let outcome = match action {
        Action::Send {
            session_id,
            mut composer,
        } => {
            let res = generation.send(&session_id, &mut composer).await;
            // Titles are decorative, let them finish on their own.
            drop(res.title_task);
            if res.outcome == GenerationOutcome::Skipped && composer.is_sendable() {
                generation.emit(Event::SendSkipped {
                    session_id,
                    composer,
                });
            }
            res.outcome
        }
        Action::Edit {
            session_id,
            message_id,
            content,
        } => generation.edit(&session_id, &message_id, &content).await,
        Action::Regenerate { session_id } => generation.regenerate(&session_id).await,
    };

    log_outcome(&session_id, &outcome);
    return outcome;
}

/// Drains actions from the front end. Each one runs as its own task so a slow
/// generation in one session never holds up another.
pub struct ActionsService {}

impl ActionsService {
    pub fn dispatch(
        generation: &GenerationService,
        action: Action,
    ) -> JoinHandle<GenerationOutcome> {
        let generation = generation.clone();
        return tokio::spawn(async move {
            return run_action(generation, action).await;
        });
    }

    pub async fn start(
        generation: GenerationService,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> Result<()> {
        while let Some(action) = rx.recv().await {
            ActionsService::dispatch(&generation, action);
        }

        tracing::debug!("Action channel closed");
        return Ok(());
    }
}
