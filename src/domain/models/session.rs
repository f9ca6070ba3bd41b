#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use uuid::Uuid;

use super::Message;
use super::Role;

pub const DEFAULT_TITLE: &str = "New Chat";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_streaming: Option<bool>,
}

impl ChatSession {
    pub fn new(model: &str) -> ChatSession {
        return ChatSession {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: vec![],
            created_at: Utc::now().timestamp_millis(),
            system_instruction: Some("".to_string()),
            model: Some(model.to_string()),
            enable_streaming: Some(true),
        };
    }

    pub fn streaming_enabled(&self) -> bool {
        return self.enable_streaming.unwrap_or(true);
    }

    pub fn model_or<'a>(&'a self, default_model: &'a str) -> &'a str {
        return match &self.model {
            Some(model) if !model.is_empty() => model.as_str(),
            _ => default_model,
        };
    }

    pub fn position(&self, message_id: &str) -> Option<usize> {
        return self.messages.iter().position(|e| return e.id == message_id);
    }

    pub fn last_is_assistant(&self) -> bool {
        return self
            .messages
            .last()
            .map(|e| return e.role == Role::Assistant)
            .unwrap_or(false);
    }

    /// Messages to send for a request over `history`. The system instruction is
    /// prepended when it has any content and is never written to the session.
    pub fn request_messages(&self, history: &[Message]) -> Vec<Message> {
        let mut messages = vec![];
        if let Some(instruction) = &self.system_instruction {
            if !instruction.trim().is_empty() {
                messages.push(Message::system(instruction));
            }
        }
        messages.extend_from_slice(history);

        return messages;
    }

    /// Phase one of a generation: commit `history` followed by the placeholder.
    pub fn with_placeholder(mut self, history: &[Message], placeholder: &Message) -> ChatSession {
        self.messages = history.to_vec();
        self.messages.push(placeholder.clone());

        return self;
    }

    /// Appends a streamed chunk to the message with `message_id`. Nothing else
    /// is touched.
    pub fn with_chunk(mut self, message_id: &str, chunk: &str) -> ChatSession {
        if let Some(message) = self.messages.iter_mut().find(|e| return e.id == message_id) {
            message.append(chunk);
        }

        return self;
    }

    /// Phase two on success: content stays exactly as accumulated.
    pub fn finalized(mut self, message_id: &str) -> ChatSession {
        if let Some(message) = self.messages.iter_mut().find(|e| return e.id == message_id) {
            message.is_streaming = false;
        }

        return self;
    }

    /// Phase two on failure: an empty placeholder is dropped, partial content
    /// is kept with streaming cleared.
    pub fn rolled_back(mut self, message_id: &str) -> ChatSession {
        let is_empty = self
            .messages
            .iter()
            .find(|e| return e.id == message_id)
            .map(|e| return e.content.is_empty());

        match is_empty {
            Some(true) => {
                self.messages.retain(|e| return e.id != message_id);
                return self;
            }
            Some(false) => {
                return self.finalized(message_id);
            }
            None => {
                return self;
            }
        }
    }

    /// Truncates to `index` inclusive and replaces that message's content.
    pub fn edited(mut self, index: usize, content: &str) -> ChatSession {
        self.messages.truncate(index + 1);
        if let Some(message) = self.messages.get_mut(index) {
            message.content = content.to_string();
        }

        return self;
    }

    /// Clears streaming flags left behind by an interrupted run.
    pub fn reconciled(mut self) -> ChatSession {
        for message in self.messages.iter_mut() {
            message.is_streaming = false;
        }

        return self;
    }
}
