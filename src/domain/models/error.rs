use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Chat failed: {status} - {body}")]
    Request { status: u16, body: String },

    #[error("Malformed stream record: {0}")]
    Parse(String),

    #[error("Failed to persist state: {0}")]
    Persistence(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> ChatError {
        return ChatError::Network(err.to_string());
    }
}
