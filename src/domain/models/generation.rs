/// Lifecycle of a single generation. `Idle` is reported for sessions without
/// one in flight.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum GenerationState {
    Idle,
    Pending,
    Streaming,
    Finalized,
    Failed,
}

/// How a send, edit or regenerate ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Preconditions were not met, nothing changed.
    Skipped,
    Finalized {
        message_id: String,
    },
    /// The error text is meant for display. `message_id` is set when partial
    /// content survived.
    Failed {
        message_id: Option<String>,
        error: String,
    },
}

impl GenerationOutcome {
    pub fn state(&self) -> GenerationState {
        return match self {
            GenerationOutcome::Skipped => GenerationState::Idle,
            GenerationOutcome::Finalized { .. } => GenerationState::Finalized,
            GenerationOutcome::Failed { .. } => GenerationState::Failed,
        };
    }
}
