pub mod event_stream;
pub mod openai;

use std::sync::Arc;

use crate::domain::models::BackendBox;

pub struct BackendManager {}

impl BackendManager {
    pub fn get() -> BackendBox {
        return Arc::new(openai::OpenAI::default());
    }
}
