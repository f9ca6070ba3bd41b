use super::Composer;

/// Work the front end hands to the background actions service.
#[derive(Debug)]
pub enum Action {
    Send {
        session_id: String,
        composer: Composer,
    },
    Edit {
        session_id: String,
        message_id: String,
        content: String,
    },
    Regenerate {
        session_id: String,
    },
}

impl Action {
    pub fn session_id(&self) -> &str {
        match self {
            Action::Send { session_id, .. } => return session_id,
            Action::Edit { session_id, .. } => return session_id,
            Action::Regenerate { session_id } => return session_id,
        }
    }
}
