//! Collaborator contracts consumed by the engine.
//!
//! Implementations own persistence, remote validation and notifications.
//! The engine relies on three store guarantees instead of locks: a plan is
//! written at most once per quest, an event is appended at most once per
//! `(quest, idx)`, and closing a quest is a compare-and-set on its active
//! state.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use questline_game::{
    ClassType, Hero, HeroId, Loot, PlannedEvent, Quest, QuestEvent, QuestId, due_after,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{StoreError, ValidationError};

/// Result of an insert-if-absent plan write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanWrite {
    Inserted,
    AlreadyPresent,
}

/// Result of a unique-per-idx event append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendResult {
    Appended,
    Duplicate,
}

/// Terminal state written when a quest stops being active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "closure", rename_all = "snake_case")]
pub enum QuestClosure {
    Completed {
        at: DateTime<Utc>,
        server_validated: bool,
    },
    GaveUp {
        at: DateTime<Utc>,
    },
}

impl QuestClosure {
    /// Apply the closure to a quest record.
    pub fn apply(self, quest: &mut Quest) {
        match self {
            Self::Completed {
                at,
                server_validated,
            } => {
                quest.completed = true;
                quest.server_validated = server_validated;
                quest.end_time = Some(at);
            }
            Self::GaveUp { at } => {
                quest.gave_up = true;
                quest.end_time = Some(at);
            }
        }
    }
}

#[async_trait]
pub trait HeroStore: Send + Sync {
    async fn current_hero(&self) -> Result<Option<Hero>, StoreError>;

    /// Insert `hero` unless a hero already exists, returning the stored hero.
    async fn insert_hero(&self, hero: Hero) -> Result<Hero, StoreError>;

    async fn update_hero(&self, hero: &Hero) -> Result<(), StoreError>;
}

#[async_trait]
pub trait QuestStore: Send + Sync {
    /// Insert a new quest. Fails with `StoreError::Conflict` when the hero
    /// already has an active quest.
    async fn insert_quest(&self, quest: &Quest) -> Result<(), StoreError>;

    async fn update_quest(&self, quest: &Quest) -> Result<(), StoreError>;

    /// Close an active quest. Returns `false` without writing when the quest
    /// was no longer active.
    async fn close_quest(
        &self,
        quest_id: &QuestId,
        closure: QuestClosure,
    ) -> Result<bool, StoreError>;

    async fn quest(&self, quest_id: &QuestId) -> Result<Option<Quest>, StoreError>;

    /// Most recently started quest for the hero, active or not.
    async fn latest_quest(&self, hero_id: &HeroId) -> Result<Option<Quest>, StoreError>;

    async fn active_quest(&self, hero_id: &HeroId) -> Result<Option<Quest>, StoreError> {
        Ok(self
            .latest_quest(hero_id)
            .await?
            .filter(Quest::is_active))
    }

    /// Persist a whole plan unless one already exists for the quest.
    async fn save_plan(
        &self,
        quest_id: &QuestId,
        plan: &[PlannedEvent],
    ) -> Result<PlanWrite, StoreError>;

    /// Full plan ordered by idx; empty when none was saved.
    async fn plan(&self, quest_id: &QuestId) -> Result<Vec<PlannedEvent>, StoreError>;

    async fn append_event(&self, event: &QuestEvent) -> Result<AppendResult, StoreError>;

    /// Event log ordered by idx.
    async fn events(&self, quest_id: &QuestId) -> Result<Vec<QuestEvent>, StoreError>;

    /// Highest idx in the quest's event log.
    async fn last_resolved_event_idx(&self, quest_id: &QuestId) -> Result<Option<u32>, StoreError>;

    /// Planned slots with `due_at <= now` and `idx > cursor`, ascending.
    async fn events_due(
        &self,
        quest_id: &QuestId,
        now: DateTime<Utc>,
        cursor: Option<u32>,
    ) -> Result<Vec<PlannedEvent>, StoreError> {
        let plan = self.plan(quest_id).await?;
        Ok(due_after(&plan, cursor, now))
    }
}

/// Payload sent to the reward validation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub hero_id: HeroId,
    pub quest_id: QuestId,
    pub duration_minutes: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub class_type: ClassType,
}

#[async_trait]
pub trait RewardValidator: Send + Sync {
    /// Authoritative loot for a finished quest.
    async fn complete_quest(&self, request: &CompletionRequest) -> Result<Loot, ValidationError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn schedule_quest_end(
        &self,
        quest_id: &QuestId,
        at: DateTime<Utc>,
    ) -> Result<(), NotifyError>;

    async fn cancel_quest_end(&self, quest_id: &QuestId) -> Result<(), NotifyError>;
}
