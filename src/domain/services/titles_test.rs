use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use futures::stream::StreamExt;
use tokio::sync::mpsc;

use super::TitleSummarizer;
use crate::domain::models::Backend;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ChunkStream;
use crate::domain::models::Event;
use crate::domain::services::SessionStore;
use crate::infrastructure::storage::memory::MemoryStorage;

struct TitleBackend {
    title: String,
}

#[async_trait]
impl Backend for TitleBackend {
    async fn list_models(&self) -> Vec<String> {
        return vec![];
    }

    async fn generate_title(&self, _text: &str, _model: &str) -> String {
        return self.title.to_string();
    }

    async fn get_completion(&self, _prompt: BackendPrompt) -> Result<ChunkStream> {
        return Ok(stream::empty::<Result<String>>().boxed());
    }
}

fn backend(title: &str) -> BackendBox {
    return Arc::new(TitleBackend {
        title: title.to_string(),
    });
}

#[tokio::test]
async fn it_announces_new_titles() -> Result<()> {
    let store = SessionStore::load(Arc::new(MemoryStorage::default()), "openai").await;
    let session_id = store.current_id().await;
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    TitleSummarizer::spawn(
        backend("Weather Talk"),
        store.clone(),
        Some(tx),
        &session_id,
        "how is the weather",
        "openai",
    )
    .await?;

    assert_eq!(store.get(&session_id).await.unwrap().title, "Weather Talk");
    assert_eq!(
        rx.try_recv()?,
        Event::TitleChanged {
            session_id: session_id.to_string(),
            title: "Weather Talk".to_string(),
        }
    );

    return Ok(());
}

#[tokio::test]
async fn it_renames_after_receiver_is_gone() -> Result<()> {
    let store = SessionStore::load(Arc::new(MemoryStorage::default()), "openai").await;
    let session_id = store.current_id().await;
    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    drop(rx);

    TitleSummarizer::spawn(
        backend("Weather Talk"),
        store.clone(),
        Some(tx),
        &session_id,
        "how is the weather",
        "openai",
    )
    .await?;

    assert_eq!(store.get(&session_id).await.unwrap().title, "Weather Talk");
    return Ok(());
}

#[tokio::test]
async fn it_keeps_title_when_none_is_generated() -> Result<()> {
    let store = SessionStore::load(Arc::new(MemoryStorage::default()), "openai").await;
    let session_id = store.current_id().await;
    let before = store.get(&session_id).await.unwrap().title;
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    TitleSummarizer::spawn(backend(""), store.clone(), Some(tx), &session_id, "hi", "openai")
        .await?;

    assert_eq!(store.get(&session_id).await.unwrap().title, before);
    assert!(rx.try_recv().is_err());
    return Ok(());
}
