use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::Message;

pub const FALLBACK_MODELS: [&str; 3] = ["openai", "mistral", "llama"];

/// Lazy, finite sequence of decoded completion text. An `Err` item ends the
/// generation.
pub type ChunkStream = BoxStream<'static, Result<String>>;

pub struct BackendPrompt {
    pub messages: Vec<Message>,
    pub model: String,
    pub stream: bool,
}

impl BackendPrompt {
    pub fn new(messages: Vec<Message>, model: &str, stream: bool) -> BackendPrompt {
        return BackendPrompt {
            messages,
            model: model.to_string(),
            stream,
        };
    }
}

#[async_trait]
pub trait Backend {
    /// Lists model identifiers. Never fails, any error falls back to
    /// `FALLBACK_MODELS`.
    async fn list_models(&self) -> Vec<String>;

    /// Derives a short title for a session from its first user message.
    /// Returns an empty string when anything goes wrong.
    async fn generate_title(&self, text: &str, model: &str) -> String;

    /// Requests a completion. A non-success response fails here, before any
    /// chunk is produced. Buffered responses arrive as a single chunk.
    async fn get_completion(&self, prompt: BackendPrompt) -> Result<ChunkStream>;
}

pub type BackendBox = Arc<dyn Backend + Send + Sync>;
