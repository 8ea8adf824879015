//! Questline Engine
//!
//! Async runtime around `questline-game`: collaborator traits with in-memory
//! reference stores, the catch-up replay engine, the quest service that
//! applies lifecycle effects, and the tick scheduler that drives it.

pub mod config;
pub mod error;
pub mod memory;
pub mod notify;
pub mod replay;
pub mod rewards;
pub mod scheduler;
pub mod service;
pub mod store;

pub use config::EngineCfg;
pub use error::{EngineError, StoreError, ValidationError};
pub use memory::{MemoryHeroStore, MemoryQuestStore};
pub use notify::{LogNotifier, RecordingNotifier};
pub use replay::{FeedLine, FeedPreview, PlanStatus, ReplayEngine, ReplayReport};
pub use rewards::LocalRewardValidator;
pub use scheduler::{
    Clock, Command, ManualClock, PipelineOutcome, SchedulerClosed, SchedulerHandle, SystemClock,
    Tick, TickScheduler, Trigger,
};
pub use service::{Collaborators, CompletionReport, QuestService, TickReport};
pub use store::{
    AppendResult, CompletionRequest, HeroStore, Notifier, NotifyError, PlanWrite, QuestClosure,
    QuestStore, RewardValidator,
};

use std::sync::Arc;

/// Memory-backed collaborators together with typed handles for inspection
/// and fault injection.
pub struct InMemory {
    pub heroes: Arc<MemoryHeroStore>,
    pub quests: Arc<MemoryQuestStore>,
    pub validator: Arc<LocalRewardValidator>,
    pub notifier: Arc<RecordingNotifier>,
}

impl InMemory {
    #[must_use]
    pub fn new(cfg: &EngineCfg) -> Self {
        Self::with_quest_store(cfg, MemoryQuestStore::new())
    }

    #[must_use]
    pub fn with_quest_store(cfg: &EngineCfg, quests: MemoryQuestStore) -> Self {
        Self {
            heroes: Arc::new(MemoryHeroStore::new()),
            quests: Arc::new(quests),
            validator: Arc::new(LocalRewardValidator::new(cfg.game.loot)),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            heroes: self.heroes.clone(),
            quests: self.quests.clone(),
            validator: self.validator.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Service wired to these collaborators.
    #[must_use]
    pub fn service(&self, cfg: EngineCfg) -> QuestService {
        QuestService::new(self.collaborators(), cfg)
    }
}
