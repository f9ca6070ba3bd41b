#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::models::ChatError;
use crate::domain::models::ChatSession;
use crate::domain::models::GenerationState;
use crate::domain::models::PersistedState;
use crate::domain::models::StorageBox;
use crate::domain::models::Theme;
use crate::domain::models::STORAGE_KEY_DEFAULT_MODEL;
use crate::domain::models::STORAGE_KEY_SESSIONS;
use crate::domain::models::STORAGE_KEY_THEME;

struct Collection {
    sessions: Vec<ChatSession>,
    current_id: String,
    default_model: String,
    theme: Theme,
}

impl Collection {
    /// Exactly one session is current. An empty collection gets a fresh
    /// session, an unknown current id falls back to the first session.
    /// Returns true when anything changed.
    fn ensure_current(&mut self) -> bool {
        if self.sessions.is_empty() {
            let session = ChatSession::new(&self.default_model);
            self.current_id = session.id.to_string();
            self.sessions.push(session);
            return true;
        }

        if !self.sessions.iter().any(|e| return e.id == self.current_id) {
            self.current_id = self.sessions[0].id.to_string();
            return true;
        }

        return false;
    }

    fn position(&self, id: &str) -> Option<usize> {
        return self.sessions.iter().position(|e| return e.id == id);
    }

    fn snapshot(&self) -> PersistedState {
        return PersistedState {
            sessions: self.sessions.clone(),
            default_model: self.default_model.to_string(),
            theme: self.theme,
        };
    }
}

/// Which saved keys a mutation touches. Generations rewrite sessions many
/// times per reply, preferences only change on request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Sessions,
    Preferences,
    All,
}

impl Scope {
    fn sessions(self) -> bool {
        return self != Scope::Preferences;
    }

    fn preferences(self) -> bool {
        return self != Scope::Sessions;
    }
}

/// Marks a generation in flight for one session. Dropping it returns the
/// session to idle, whichever way the generation ended.
pub struct GenerationGuard {
    session_id: String,
    generations: Arc<DashMap<String, GenerationState>>,
}

impl GenerationGuard {
    pub fn session_id(&self) -> &str {
        return &self.session_id;
    }

    pub fn set_state(&self, state: GenerationState) {
        self.generations.insert(self.session_id.to_string(), state);
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.generations.remove(&self.session_id);
    }
}

/// Owns every chat session and writes the full collection to storage after
/// each mutation. Cloning is cheap and all clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<Mutex<Collection>>,
    storage: StorageBox,
    generations: Arc<DashMap<String, GenerationState>>,
}

async fn read_key<T: serde::de::DeserializeOwned>(
    storage: &StorageBox,
    key: &str,
) -> Option<T> {
    let payload = match storage.get(key).await {
        Ok(Some(payload)) => payload,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(error = ?err, key = key, "Failed to read saved state");
            return None;
        }
    };

    match serde_json::from_str::<T>(&payload) {
        Ok(value) => return Some(value),
        Err(err) => {
            tracing::warn!(error = ?err, key = key, "Discarding unreadable saved state");
            return None;
        }
    }
}

impl SessionStore {
    /// Reads saved sessions without creating a store or writing anything back.
    pub async fn read_saved(storage: &StorageBox) -> Vec<ChatSession> {
        return read_key::<Vec<ChatSession>>(storage, STORAGE_KEY_SESSIONS)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|session| return session.reconciled())
            .collect();
    }

    /// Loads saved state. Anything unreadable is treated as never saved.
    pub async fn load(storage: StorageBox, fallback_model: &str) -> SessionStore {
        let sessions = SessionStore::read_saved(&storage).await;

        let default_model = read_key::<String>(&storage, STORAGE_KEY_DEFAULT_MODEL)
            .await
            .filter(|e| return !e.is_empty())
            .unwrap_or_else(|| return fallback_model.to_string());

        let theme = read_key::<Theme>(&storage, STORAGE_KEY_THEME)
            .await
            .unwrap_or_default();

        let mut collection = Collection {
            sessions,
            current_id: "".to_string(),
            default_model,
            theme,
        };
        collection.ensure_current();

        tracing::debug!(
            sessions = collection.sessions.len(),
            current = collection.current_id,
            "Loaded sessions"
        );

        let store = SessionStore {
            state: Arc::new(Mutex::new(collection)),
            storage,
            generations: Arc::new(DashMap::new()),
        };

        let state = store.state.lock().await;
        store.persist(&state, Scope::All).await;
        drop(state);

        return store;
    }

    #[allow(clippy::implicit_return)]
    async fn write(&self, state: &Collection, scope: Scope) -> Result<()> {
        let snapshot = state.snapshot();
        if scope.sessions() {
            self.storage
                .set(
                    STORAGE_KEY_SESSIONS,
                    &serde_json::to_string(&snapshot.sessions)?,
                )
                .await?;
        }
        if scope.preferences() {
            self.storage
                .set(
                    STORAGE_KEY_DEFAULT_MODEL,
                    &serde_json::to_string(&snapshot.default_model)?,
                )
                .await?;
            self.storage
                .set(STORAGE_KEY_THEME, &serde_json::to_string(&snapshot.theme)?)
                .await?;
        }

        return Ok(());
    }

    /// Best effort. A failed write is logged and the in memory state stays
    /// authoritative.
    async fn persist(&self, state: &Collection, scope: Scope) {
        if let Err(err) = self.write(state, scope).await {
            let persist_err = ChatError::Persistence(format!("{err:#}"));
            tracing::error!(error = ?persist_err, scope = ?scope, "Failed to persist sessions");
        }
    }

    pub async fn list(&self) -> Vec<ChatSession> {
        return self.state.lock().await.sessions.clone();
    }

    pub async fn get(&self, id: &str) -> Option<ChatSession> {
        let state = self.state.lock().await;
        return state.sessions.iter().find(|e| return e.id == id).cloned();
    }

    pub async fn current_id(&self) -> String {
        return self.state.lock().await.current_id.to_string();
    }

    /// The current session, synthesizing one if the collection is empty.
    pub async fn current(&self) -> ChatSession {
        let mut state = self.state.lock().await;
        if state.ensure_current() {
            self.persist(&state, Scope::Sessions).await;
        }

        let idx = state.position(&state.current_id).unwrap_or(0);
        return state.sessions[idx].clone();
    }

    /// Applies `transform` to the session with `id`. Returns false, without
    /// persisting, when no such session exists.
    pub async fn update<F>(&self, id: &str, transform: F) -> bool
    where
        F: FnOnce(ChatSession) -> ChatSession,
    {
        let mut state = self.state.lock().await;
        let idx = match state.position(id) {
            Some(idx) => idx,
            None => {
                tracing::debug!(session_id = id, "Skipping update for missing session");
                return false;
            }
        };

        let session = state.sessions.remove(idx);
        state.sessions.insert(idx, transform(session));
        self.persist(&state, Scope::Sessions).await;

        return true;
    }

    pub async fn update_current<F>(&self, transform: F) -> bool
    where
        F: FnOnce(ChatSession) -> ChatSession,
    {
        let id = self.current_id().await;
        return self.update(&id, transform).await;
    }

    pub async fn replace_all(&self, sessions: Vec<ChatSession>) {
        let mut state = self.state.lock().await;
        state.sessions = sessions;
        state.ensure_current();
        self.persist(&state, Scope::Sessions).await;
    }

    pub async fn set_current(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.position(id).is_none() {
            return false;
        }

        state.current_id = id.to_string();
        return true;
    }

    /// Starts a new empty session at the top of the list and makes it current.
    pub async fn create_session(&self) -> ChatSession {
        let mut state = self.state.lock().await;
        let session = ChatSession::new(&state.default_model);
        state.current_id = session.id.to_string();
        state.sessions.insert(0, session.clone());
        self.persist(&state, Scope::Sessions).await;

        return session;
    }

    /// Removes a session. When it was current, the first remaining session
    /// takes over, or a fresh one if none are left.
    pub async fn delete(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        let idx = match state.position(id) {
            Some(idx) => idx,
            None => return false,
        };

        state.sessions.remove(idx);
        state.ensure_current();
        self.persist(&state, Scope::Sessions).await;

        return true;
    }

    pub async fn rename(&self, id: &str, title: &str) -> bool {
        let title = title.to_string();
        return self
            .update(id, |mut session| {
                session.title = title;
                return session;
            })
            .await;
    }

    pub async fn set_system_instruction(&self, id: &str, instruction: &str) -> bool {
        let instruction = instruction.to_string();
        return self
            .update(id, |mut session| {
                session.system_instruction = Some(instruction);
                return session;
            })
            .await;
    }

    /// Sets the model of one session and remembers it as the default for new
    /// sessions.
    pub async fn set_model(&self, id: &str, model: &str) -> bool {
        self.set_default_model(model).await;

        let model = model.to_string();
        return self
            .update(id, |mut session| {
                session.model = Some(model);
                return session;
            })
            .await;
    }

    /// Flips streaming for a session and returns the new setting.
    pub async fn toggle_streaming(&self, id: &str) -> Option<bool> {
        let mut enabled = None;
        self.update(id, |mut session| {
            let next = !session.streaming_enabled();
            session.enable_streaming = Some(next);
            enabled = Some(next);
            return session;
        })
        .await;

        return enabled;
    }

    pub async fn default_model(&self) -> String {
        return self.state.lock().await.default_model.to_string();
    }

    pub async fn set_default_model(&self, model: &str) {
        let mut state = self.state.lock().await;
        state.default_model = model.to_string();
        self.persist(&state, Scope::Preferences).await;
    }

    pub async fn theme(&self) -> Theme {
        return self.state.lock().await.theme;
    }

    pub async fn toggle_theme(&self) -> Theme {
        let mut state = self.state.lock().await;
        state.theme = state.theme.toggled();
        self.persist(&state, Scope::Preferences).await;

        return state.theme;
    }

    /// Claims the single generation slot of a session. Returns `None` while
    /// another generation for the same session is in flight.
    pub fn begin_generation(&self, id: &str) -> Option<GenerationGuard> {
        match self.generations.entry(id.to_string()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(entry) => {
                entry.insert(GenerationState::Pending);
            }
        }

        return Some(GenerationGuard {
            session_id: id.to_string(),
            generations: self.generations.clone(),
        });
    }

    pub fn generation_state(&self, id: &str) -> GenerationState {
        return self
            .generations
            .get(id)
            .map(|e| return *e.value())
            .unwrap_or(GenerationState::Idle);
    }

    pub fn is_generating(&self, id: &str) -> bool {
        return self.generations.contains_key(id);
    }
}
