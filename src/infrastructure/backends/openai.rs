#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use futures::stream::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::event_stream::decode_chunks;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ChatError;
use crate::domain::models::ChunkStream;
use crate::domain::models::Message;
use crate::domain::models::FALLBACK_MODELS;

const TITLE_INSTRUCTION: &str = "Generate a concise, 3-5 word title for this chat session based on the user's message. Do not use quotes. Return only the title.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessageRequest {
    role: String,
    content: MessageContent,
}

impl From<&Message> for MessageRequest {
    fn from(message: &Message) -> MessageRequest {
        let images = message.images();
        if images.is_empty() {
            return MessageRequest {
                role: message.role.to_string(),
                content: MessageContent::Text(message.content.to_string()),
            };
        }

        let mut parts = vec![ContentPart::Text {
            text: message.content.to_string(),
        }];
        parts.extend(images.iter().map(|url| {
            return ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: url.to_string(),
                },
            };
        }));

        return MessageRequest {
            role: message.role.to_string(),
            content: MessageContent::Parts(parts),
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<MessageRequest>,
    stream: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionChoiceResponse {
    #[serde(default)]
    message: CompletionMessageResponse,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoiceResponse>,
}

impl CompletionResponse {
    fn content(self) -> String {
        return self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| return choice.message.content)
            .unwrap_or_default();
    }
}

fn model_name(entry: Value, keys: [&str; 2]) -> Option<String> {
    match entry {
        Value::String(name) => return Some(name),
        Value::Object(obj) => {
            return keys
                .iter()
                .find_map(|key| return obj.get(*key).and_then(|e| return e.as_str()))
                .map(|e| return e.to_string());
        }
        _ => return None,
    }
}

/// Accepts either a flat array or `{ data: [...] }`. Flat entries are plain
/// strings or `{ name }` / `{ id }` records. Records under `data` are
/// addressed by `id`, with `name` only as a fallback.
fn normalize_models(body: Value) -> Vec<String> {
    let (entries, keys) = match body {
        Value::Array(entries) => (entries, ["name", "id"]),
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(entries)) => (entries, ["id", "name"]),
            _ => (vec![], ["id", "name"]),
        },
        _ => (vec![], ["id", "name"]),
    };

    return entries
        .into_iter()
        .filter_map(|entry| return model_name(entry, keys))
        .collect();
}

fn fallback_models() -> Vec<String> {
    return FALLBACK_MODELS.iter().map(|e| return e.to_string()).collect();
}

/// Removes one leading and one trailing quote character.
fn strip_quotes(title: &str) -> String {
    let mut res = title;
    if let Some(stripped) = res.strip_prefix(['"', '\'']) {
        res = stripped;
    }
    if let Some(stripped) = res.strip_suffix(['"', '\'']) {
        res = stripped;
    }

    return res.to_string();
}

/// Client for OpenAI compatible chat completion APIs.
pub struct OpenAI {
    url: String,
    token: String,
}

impl Default for OpenAI {
    fn default() -> OpenAI {
        return OpenAI::new(
            &Config::get(ConfigKey::ApiURL),
            &Config::get(ConfigKey::ApiToken),
        );
    }
}

impl OpenAI {
    pub fn new(url: &str, token: &str) -> OpenAI {
        return OpenAI {
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        };
    }

    fn completions_url(&self) -> String {
        return format!("{url}/generate/v1/chat/completions", url = self.url);
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            return req;
        }

        return req.header("Authorization", format!("Bearer {}", self.token));
    }

    async fn send(&self, body: &CompletionRequest) -> Result<reqwest::Response> {
        let res = self
            .with_auth(reqwest::Client::new().post(self.completions_url()))
            .json(body)
            .send()
            .await
            .map_err(ChatError::from)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = body,
                "Failed to make completion request"
            );
            return Err(ChatError::Request {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        return Ok(res);
    }

    #[allow(clippy::implicit_return)]
    async fn fetch_models(&self) -> Result<Vec<String>> {
        let res = reqwest::Client::new()
            .get(format!("{url}/generate/v1/models", url = self.url))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        return Ok(normalize_models(res));
    }

    #[allow(clippy::implicit_return)]
    async fn fetch_title(&self, text: &str, model: &str) -> Result<String> {
        let req = CompletionRequest {
            model: model.to_string(),
            messages: vec![
                MessageRequest {
                    role: "system".to_string(),
                    content: MessageContent::Text(TITLE_INSTRUCTION.to_string()),
                },
                MessageRequest {
                    role: "user".to_string(),
                    content: MessageContent::Text(text.to_string()),
                },
            ],
            stream: false,
        };

        let res = self
            .send(&req)
            .await?
            .json::<CompletionResponse>()
            .await?;

        return Ok(strip_quotes(res.content().trim()));
    }
}

#[async_trait]
impl Backend for OpenAI {
    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) if !models.is_empty() => return models,
            Ok(_) => {
                tracing::warn!("Model list was empty, using fallback models");
                return fallback_models();
            }
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to fetch models, using fallback models");
                return fallback_models();
            }
        }
    }

    #[allow(clippy::implicit_return)]
    async fn generate_title(&self, text: &str, model: &str) -> String {
        if text.trim().is_empty() {
            return "".to_string();
        }

        match self.fetch_title(text, model).await {
            Ok(title) => return title,
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to generate title");
                return "".to_string();
            }
        }
    }

    #[allow(clippy::implicit_return)]
    async fn get_completion(&self, prompt: BackendPrompt) -> Result<ChunkStream> {
        let req = CompletionRequest {
            model: prompt.model,
            messages: prompt.messages.iter().map(MessageRequest::from).collect(),
            stream: prompt.stream,
        };
        tracing::debug!(
            model = req.model,
            stream = req.stream,
            messages = req.messages.len(),
            "Completion request"
        );

        let res = self.send(&req).await?;

        if !req.stream {
            let body = res
                .json::<CompletionResponse>()
                .await
                .map_err(ChatError::from)?;
            let content = body.content();
            return Ok(stream::once(async move { return Ok(content) }).boxed());
        }

        return Ok(decode_chunks(res.bytes_stream()));
    }
}
