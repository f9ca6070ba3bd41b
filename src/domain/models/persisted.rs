use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::ChatSession;
use super::Theme;

pub const STORAGE_KEY_SESSIONS: &str = "synapse_sessions_v1";
pub const STORAGE_KEY_DEFAULT_MODEL: &str = "synapse_default_model";
pub const STORAGE_KEY_THEME: &str = "synapse_theme";

/// Everything that survives a restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub sessions: Vec<ChatSession>,
    pub default_model: String,
    pub theme: Theme,
}
