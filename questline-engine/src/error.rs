use questline_game::{ConfigError, LifecycleError, QuestId};
use thiserror::Error;

/// Failures reported by persistence collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Read or write could not be performed right now; retry on a later tick.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A uniqueness or ordering constraint rejected the write.
    #[error("store conflict: {0}")]
    Conflict(String),
    #[error("quest {0} not found")]
    QuestNotFound(QuestId),
}

/// Failures reported by the reward validation service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("reward validation rejected quest {quest_id}: {reason}")]
    Rejected { quest_id: QuestId, reason: String },
    #[error("reward validation unreachable: {0}")]
    Unreachable(String),
}

/// Typed outcome of any failed engine operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether the next tick may succeed without any user action.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Unavailable(_))
                | Self::Validation(ValidationError::Unreachable(_))
        )
    }
}
