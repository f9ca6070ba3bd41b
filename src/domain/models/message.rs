#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Message {
        return Message {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            images: None,
            is_streaming: false,
            model: None,
        };
    }

    /// A user message. Attachments are only kept when there is at least one.
    pub fn user(content: &str, images: Vec<String>) -> Message {
        let mut message = Message::new(Role::User, content);
        if !images.is_empty() {
            message.images = Some(images);
        }

        return message;
    }

    /// Empty assistant message that incoming chunks are folded into.
    pub fn placeholder(model: &str) -> Message {
        let mut message = Message::new(Role::Assistant, "");
        message.is_streaming = true;
        message.model = Some(model.to_string());

        return message;
    }

    /// Synthetic system message sent ahead of the history. Never persisted.
    pub fn system(content: &str) -> Message {
        let mut message = Message::new(Role::System, content);
        message.id = "system".to_string();

        return message;
    }

    pub fn append(&mut self, text: &str) {
        self.content += text;
    }

    pub fn images(&self) -> &[String] {
        return self.images.as_deref().unwrap_or_default();
    }
}
