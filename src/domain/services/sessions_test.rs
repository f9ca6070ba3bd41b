use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use super::SessionStore;
use crate::domain::models::ChatSession;
use crate::domain::models::GenerationState;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::Storage;
use crate::domain::models::StorageBox;
use crate::domain::models::Theme;
use crate::domain::models::DEFAULT_TITLE;
use crate::domain::models::STORAGE_KEY_DEFAULT_MODEL;
use crate::domain::models::STORAGE_KEY_SESSIONS;
use crate::domain::models::STORAGE_KEY_THEME;
use crate::infrastructure::storage::memory::MemoryStorage;

struct BrokenStorage {}

#[async_trait]
impl Storage for BrokenStorage {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        bail!("disk on fire")
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        bail!("disk on fire")
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        bail!("disk on fire")
    }
}

/// Records how often each key is written.
#[derive(Default)]
struct CountingStorage {
    inner: MemoryStorage,
    writes: DashMap<String, usize>,
}

impl CountingStorage {
    fn writes(&self, key: &str) -> usize {
        return self.writes.get(key).map(|e| return *e.value()).unwrap_or(0);
    }

    fn total_writes(&self) -> usize {
        return self.writes.iter().map(|e| return *e.value()).sum();
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        return self.inner.get(key).await;
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        *self.writes.entry(key.to_string()).or_insert(0) += 1;
        return self.inner.set(key, value).await;
    }

    async fn remove(&self, key: &str) -> Result<()> {
        return self.inner.remove(key).await;
    }
}

fn memory() -> StorageBox {
    return Arc::new(MemoryStorage::default());
}

#[tokio::test]
async fn it_synthesizes_session_when_empty() {
    let store = SessionStore::load(memory(), "openai").await;
    let sessions = store.list().await;

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].title, DEFAULT_TITLE);
    assert_eq!(sessions[0].model, Some("openai".to_string()));
    assert_eq!(store.current_id().await, sessions[0].id);
}

#[tokio::test]
async fn it_treats_unreadable_state_as_empty() -> Result<()> {
    let storage = memory();
    storage.set(STORAGE_KEY_SESSIONS, "{definitely not json").await?;
    storage.set(STORAGE_KEY_THEME, "\"purple\"").await?;

    let store = SessionStore::load(storage, "openai").await;
    assert_eq!(store.list().await.len(), 1);
    assert_eq!(store.theme().await, Theme::Dark);

    return Ok(());
}

#[tokio::test]
async fn it_survives_broken_storage() {
    let store = SessionStore::load(Arc::new(BrokenStorage {}), "openai").await;
    let session = store.create_session().await;

    assert!(store.rename(&session.id, "Still works").await);
    assert_eq!(store.get(&session.id).await.unwrap().title, "Still works");
    assert_eq!(store.list().await.len(), 2);
}

#[tokio::test]
async fn it_round_trips_sessions() -> Result<()> {
    let storage = memory();
    let store = SessionStore::load(storage.clone(), "openai").await;
    let second = store.create_session().await;
    let third = store.create_session().await;

    store
        .update(&second.id, |mut session| {
            session.messages.push(Message::user("first", vec![]));
            session.messages.push(Message::new(Role::Assistant, "second"));
            return session;
        })
        .await;
    store.rename(&third.id, "Third").await;
    store.set_default_model("mistral").await;
    store.toggle_theme().await;

    let before = store.list().await;
    let restored = SessionStore::load(storage.clone(), "openai").await;
    let after = restored.list().await;

    assert_eq!(after.len(), 3);
    assert_eq!(before, after);
    assert_eq!(after[0].title, "Third");
    assert_eq!(after[1].messages[0].content, "first");
    assert_eq!(after[1].messages[1].content, "second");
    assert_eq!(restored.default_model().await, "mistral");
    assert_eq!(restored.theme().await, Theme::Light);
    assert_eq!(
        storage.get(STORAGE_KEY_DEFAULT_MODEL).await?,
        Some("\"mistral\"".to_string())
    );

    return Ok(());
}

#[tokio::test]
async fn it_clears_stale_streaming_flags_on_load() -> Result<()> {
    let mut session = ChatSession::new("openai");
    let mut placeholder = Message::placeholder("openai");
    placeholder.content = "half an ans".to_string();
    session.messages = vec![Message::user("Question", vec![]), placeholder];

    let storage = memory();
    storage
        .set(STORAGE_KEY_SESSIONS, &serde_json::to_string(&vec![session])?)
        .await?;

    let store = SessionStore::load(storage, "openai").await;
    let loaded = store.current().await;
    assert_eq!(loaded.messages.len(), 2);
    assert!(!loaded.messages[1].is_streaming);
    assert_eq!(loaded.messages[1].content, "half an ans");

    return Ok(());
}

#[tokio::test]
async fn it_adopts_first_session_as_current() {
    let store = SessionStore::load(memory(), "openai").await;
    let a = ChatSession::new("openai");
    let b = ChatSession::new("openai");
    store.replace_all(vec![a.clone(), b.clone()]).await;

    assert_eq!(store.current_id().await, a.id);
    assert!(store.set_current(&b.id).await);
    assert_eq!(store.current_id().await, b.id);
    assert!(!store.set_current("missing").await);
    assert_eq!(store.current_id().await, b.id);
}

#[tokio::test]
async fn it_prepends_new_sessions() {
    let store = SessionStore::load(memory(), "openai").await;
    store.set_default_model("llama").await;
    let created = store.create_session().await;

    let sessions = store.list().await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, created.id);
    assert_eq!(store.current_id().await, created.id);
    assert_eq!(created.model, Some("llama".to_string()));
}

#[tokio::test]
async fn it_falls_back_after_deleting_current() {
    let store = SessionStore::load(memory(), "openai").await;
    let first = store.current().await;
    let second = store.create_session().await;

    assert!(store.delete(&second.id).await);
    assert_eq!(store.current_id().await, first.id);

    assert!(store.delete(&first.id).await);
    let sessions = store.list().await;
    assert_eq!(sessions.len(), 1);
    assert_ne!(sessions[0].id, first.id);
    assert_eq!(store.current_id().await, sessions[0].id);

    assert!(!store.delete("missing").await);
}

#[tokio::test]
async fn it_keeps_current_when_deleting_other() {
    let store = SessionStore::load(memory(), "openai").await;
    let first = store.current().await;
    let second = store.create_session().await;

    assert!(store.delete(&first.id).await);
    assert_eq!(store.current_id().await, second.id);
}

#[tokio::test]
async fn it_updates_only_matching_session() {
    let store = SessionStore::load(memory(), "openai").await;
    let first = store.current().await;
    let second = store.create_session().await;

    assert!(store.update_current(|mut session| {
        session.title = "Current".to_string();
        return session;
    })
    .await);
    assert!(!store.update("missing", |session| return session).await);

    assert_eq!(store.get(&second.id).await.unwrap().title, "Current");
    assert_eq!(store.get(&first.id).await.unwrap().title, DEFAULT_TITLE);
}

#[tokio::test]
async fn it_changes_session_settings() {
    let store = SessionStore::load(memory(), "openai").await;
    let id = store.current_id().await;

    assert!(store.set_system_instruction(&id, "Talk like a pirate").await);
    assert!(store.set_model(&id, "mistral").await);
    assert_eq!(store.toggle_streaming(&id).await, Some(false));
    assert_eq!(store.toggle_streaming(&id).await, Some(true));
    assert_eq!(store.toggle_streaming("missing").await, None);

    let session = store.get(&id).await.unwrap();
    assert_eq!(session.system_instruction, Some("Talk like a pirate".to_string()));
    assert_eq!(session.model, Some("mistral".to_string()));
    assert_eq!(store.default_model().await, "mistral");
}

#[tokio::test]
async fn it_allows_one_generation_per_session() {
    let store = SessionStore::load(memory(), "openai").await;
    let first = store.current().await;
    let second = store.create_session().await;

    let guard = store.begin_generation(&first.id);
    assert!(guard.is_some());
    assert!(store.begin_generation(&first.id).is_none());
    assert_eq!(store.generation_state(&first.id), GenerationState::Pending);

    let other = store.begin_generation(&second.id);
    assert!(other.is_some());

    guard.as_ref().unwrap().set_state(GenerationState::Streaming);
    assert_eq!(store.generation_state(&first.id), GenerationState::Streaming);

    drop(guard);
    assert_eq!(store.generation_state(&first.id), GenerationState::Idle);
    assert!(!store.is_generating(&first.id));
    assert!(store.is_generating(&second.id));
    assert!(store.begin_generation(&first.id).is_some());
}

#[tokio::test]
async fn it_only_rewrites_sessions_while_generating() {
    let storage = Arc::new(CountingStorage::default());
    let store = SessionStore::load(storage.clone(), "openai").await;
    assert_eq!(storage.writes(STORAGE_KEY_SESSIONS), 1);
    assert_eq!(storage.writes(STORAGE_KEY_DEFAULT_MODEL), 1);
    assert_eq!(storage.writes(STORAGE_KEY_THEME), 1);

    let id = store.current_id().await;
    let history = vec![Message::user("hi", vec![])];
    let placeholder = Message::placeholder("openai");
    store
        .update(&id, |session| {
            return session.with_placeholder(&history, &placeholder);
        })
        .await;
    for chunk in ["Hel", "lo", "!"] {
        store
            .update(&id, |session| {
                return session.with_chunk(&placeholder.id, chunk);
            })
            .await;
    }

    assert_eq!(storage.writes(STORAGE_KEY_SESSIONS), 5);
    assert_eq!(storage.writes(STORAGE_KEY_DEFAULT_MODEL), 1);
    assert_eq!(storage.writes(STORAGE_KEY_THEME), 1);

    store.toggle_theme().await;
    store.set_model(&id, "mistral").await;

    assert_eq!(storage.writes(STORAGE_KEY_THEME), 3);
    assert_eq!(storage.writes(STORAGE_KEY_DEFAULT_MODEL), 3);
    assert_eq!(storage.writes(STORAGE_KEY_SESSIONS), 6);
}

#[tokio::test]
async fn it_reads_saved_sessions_without_writing() -> Result<()> {
    let mut session = ChatSession::new("openai");
    session.title = "Saved".to_string();
    session.messages = vec![
        Message::user("Question", vec![]),
        Message::placeholder("openai"),
    ];

    let storage = Arc::new(CountingStorage::default());
    storage
        .inner
        .set(STORAGE_KEY_SESSIONS, &serde_json::to_string(&vec![session])?)
        .await?;
    let boxed: StorageBox = storage.clone();

    let saved = SessionStore::read_saved(&boxed).await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title, "Saved");
    assert!(!saved[0].messages[1].is_streaming);

    let empty: StorageBox = Arc::new(CountingStorage::default());
    assert!(SessionStore::read_saved(&empty).await.is_empty());
    assert_eq!(storage.total_writes(), 0);

    return Ok(());
}
