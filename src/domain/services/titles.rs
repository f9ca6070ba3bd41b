#[cfg(test)]
#[path = "titles_test.rs"]
mod tests;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SessionStore;
use crate::domain::models::BackendBox;
use crate::domain::models::Event;

/// Renames a session after its first message. Runs detached from the send
/// that triggered it and never reports failure, the title just stays as is.
pub struct TitleSummarizer {}

impl TitleSummarizer {
    pub fn spawn(
        backend: BackendBox,
        store: SessionStore,
        events: Option<mpsc::UnboundedSender<Event>>,
        session_id: &str,
        text: &str,
        model: &str,
    ) -> JoinHandle<()> {
        let session_id = session_id.to_string();
        let text = text.to_string();
        let model = model.to_string();

        return tokio::spawn(async move {
            let title = backend.generate_title(&text, &model).await;
            if title.is_empty() {
                tracing::debug!(session_id = session_id, "No title generated");
                return;
            }

            if !store.rename(&session_id, &title).await {
                return;
            }

            if let Some(tx) = events {
                if tx.send(Event::TitleChanged { session_id, title }).is_err() {
                    tracing::debug!("Event receiver dropped");
                }
            }
        });
    }
}
