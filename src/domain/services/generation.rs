#[cfg(test)]
#[path = "generation_test.rs"]
mod tests;

use anyhow::Result;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::GenerationGuard;
use super::SessionStore;
use super::TitleSummarizer;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ChatSession;
use crate::domain::models::Composer;
use crate::domain::models::Event;
use crate::domain::models::GenerationOutcome;
use crate::domain::models::GenerationState;
use crate::domain::models::Message;
use crate::domain::models::Role;

pub struct SendResult {
    pub outcome: GenerationOutcome,
    /// Present when the send started title summarization for a new session.
    pub title_task: Option<JoinHandle<()>>,
}

impl SendResult {
    fn skipped() -> SendResult {
        return SendResult {
            outcome: GenerationOutcome::Skipped,
            title_task: None,
        };
    }
}

/// Turns send, edit and regenerate into committed session history.
///
/// Every update made on behalf of a generation is addressed by the session id
/// captured when it started, so switching the current session mid stream
/// never misroutes chunks.
#[derive(Clone)]
pub struct GenerationService {
    store: SessionStore,
    backend: BackendBox,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl GenerationService {
    pub fn new(store: SessionStore, backend: BackendBox) -> GenerationService {
        return GenerationService {
            store,
            backend,
            events: None,
        };
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<Event>) -> GenerationService {
        self.events = Some(tx);
        return self;
    }

    pub fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                tracing::debug!("Event receiver dropped");
            }
        }
    }

    /// Sends the composer's content to the current session, creating one
    /// first if none exist.
    pub async fn send_current(&self, composer: &mut Composer) -> SendResult {
        let session = self.store.current().await;
        return self.send(&session.id, composer).await;
    }

    /// Appends a user message and generates a reply. Blank input, or a
    /// generation already in flight for the session, leaves everything
    /// untouched including the composer.
    pub async fn send(&self, session_id: &str, composer: &mut Composer) -> SendResult {
        if !composer.is_sendable() {
            return SendResult::skipped();
        }

        let guard = match self.store.begin_generation(session_id) {
            Some(guard) => guard,
            None => {
                tracing::debug!(session_id = session_id, "Generation in flight, ignoring send");
                return SendResult::skipped();
            }
        };

        let session = match self.store.get(session_id).await {
            Some(session) => session,
            None => return SendResult::skipped(),
        };

        let default_model = self.store.default_model().await;
        let model = session.model_or(&default_model).to_string();
        let is_first_message = session.messages.is_empty();

        let (text, images) = composer.take();
        let mut history = session.messages.to_vec();
        history.push(Message::user(&text, images));

        let committed = history.to_vec();
        self.store
            .update(session_id, |mut session| {
                session.messages = committed;
                return session;
            })
            .await;

        let mut title_task = None;
        if is_first_message && !text.is_empty() {
            title_task = Some(TitleSummarizer::spawn(
                self.backend.clone(),
                self.store.clone(),
                self.events.clone(),
                session_id,
                &text,
                &model,
            ));
        }

        let outcome = self.generate(guard, &session, history, &model).await;

        return SendResult {
            outcome,
            title_task,
        };
    }

    /// Replaces the content of a message and drops everything after it. When
    /// the message was written by the user a fresh reply is generated.
    pub async fn edit(
        &self,
        session_id: &str,
        message_id: &str,
        content: &str,
    ) -> GenerationOutcome {
        let guard = match self.store.begin_generation(session_id) {
            Some(guard) => guard,
            None => return GenerationOutcome::Skipped,
        };

        let session = match self.store.get(session_id).await {
            Some(session) => session,
            None => return GenerationOutcome::Skipped,
        };

        let idx = match session.position(message_id) {
            Some(idx) => idx,
            None => return GenerationOutcome::Skipped,
        };

        let edited = session.edited(idx, content);
        let committed = edited.messages.to_vec();
        self.store
            .update(session_id, |mut session| {
                session.messages = committed;
                return session;
            })
            .await;

        if edited.messages[idx].role != Role::User {
            return GenerationOutcome::Skipped;
        }

        let default_model = self.store.default_model().await;
        let model = edited.model_or(&default_model).to_string();
        let history = edited.messages.to_vec();

        return self.generate(guard, &edited, history, &model).await;
    }

    /// Drops the trailing assistant reply and generates a new one.
    pub async fn regenerate(&self, session_id: &str) -> GenerationOutcome {
        let guard = match self.store.begin_generation(session_id) {
            Some(guard) => guard,
            None => return GenerationOutcome::Skipped,
        };

        let session = match self.store.get(session_id).await {
            Some(session) => session,
            None => return GenerationOutcome::Skipped,
        };

        if !session.last_is_assistant() {
            return GenerationOutcome::Skipped;
        }

        let history = session.messages[..session.messages.len() - 1].to_vec();
        let committed = history.to_vec();
        self.store
            .update(session_id, |mut session| {
                session.messages = committed;
                return session;
            })
            .await;

        let default_model = self.store.default_model().await;
        let model = session.model_or(&default_model).to_string();

        return self.generate(guard, &session, history, &model).await;
    }

    /// Runs one generation over `history`. Holding `guard` for the whole call
    /// keeps the session's single generation slot claimed until it returns.
    async fn generate(
        &self,
        guard: GenerationGuard,
        session: &ChatSession,
        history: Vec<Message>,
        model: &str,
    ) -> GenerationOutcome {
        let session_id = guard.session_id().to_string();
        let placeholder = Message::placeholder(model);
        let message_id = placeholder.id.to_string();
        let streaming = session.streaming_enabled();

        let prompt = BackendPrompt::new(session.request_messages(&history), model, streaming);

        self.store
            .update(&session_id, |session| {
                return session.with_placeholder(&history, &placeholder);
            })
            .await;
        self.emit(Event::GenerationStarted {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
        });

        if !streaming {
            guard.set_state(GenerationState::Streaming);
        }

        tracing::debug!(
            session_id = session_id,
            message_id = message_id,
            model = model,
            streaming = streaming,
            "Starting generation"
        );

        match self.fold_chunks(&guard, &message_id, prompt).await {
            Ok(()) => {
                self.store
                    .update(&session_id, |session| {
                        return session.finalized(&message_id);
                    })
                    .await;
                self.emit(Event::GenerationFinished {
                    session_id,
                    message_id: message_id.to_string(),
                });

                return GenerationOutcome::Finalized { message_id };
            }
            Err(err) => {
                tracing::error!(error = ?err, session_id = session_id, "Generation failed");

                let mut kept = false;
                self.store
                    .update(&session_id, |session| {
                        let session = session.rolled_back(&message_id);
                        kept = session.position(&message_id).is_some();
                        return session;
                    })
                    .await;

                let error = err.to_string();
                self.emit(Event::GenerationFailed {
                    session_id,
                    error: error.to_string(),
                });

                return GenerationOutcome::Failed {
                    message_id: kept.then_some(message_id),
                    error,
                };
            }
        }
    }

    #[allow(clippy::implicit_return)]
    async fn fold_chunks(
        &self,
        guard: &GenerationGuard,
        message_id: &str,
        prompt: BackendPrompt,
    ) -> Result<()> {
        let session_id = guard.session_id();
        let mut chunks = self.backend.get_completion(prompt).await?;

        while let Some(chunk) = chunks.next().await {
            let text = chunk?;
            guard.set_state(GenerationState::Streaming);

            self.store
                .update(session_id, |session| {
                    return session.with_chunk(message_id, &text);
                })
                .await;
            self.emit(Event::GenerationChunk {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
                text,
            });
        }

        return Ok(());
    }
}
