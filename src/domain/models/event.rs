use super::Composer;

/// Progress notifications emitted while sessions are mutated in the
/// background. The session store stays the source of truth, these only tell a
/// front end what to redraw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    GenerationStarted {
        session_id: String,
        message_id: String,
    },
    GenerationChunk {
        session_id: String,
        message_id: String,
        text: String,
    },
    GenerationFinished {
        session_id: String,
        message_id: String,
    },
    GenerationFailed {
        session_id: String,
        error: String,
    },
    /// A send was refused because the session was already generating. Carries
    /// the input back so nothing typed or attached is lost.
    SendSkipped {
        session_id: String,
        composer: Composer,
    },
    TitleChanged {
        session_id: String,
        title: String,
    },
}
