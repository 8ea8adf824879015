//! Catch-up replay of due quest events.
//!
//! A pass reads the cursor from the persisted log, resolves every planned
//! slot that became due after it, and appends the results in idx order.
//! Nothing else is stored: the log itself is the checkpoint, so a pass that
//! dies part way resumes at `cursor + 1` on the next call.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use questline_game::{
    EventKind, EventOutcome, Hero, PlannerCfg, Quest, QuestEvent, QuestId, RewardTally,
    plan_spec_for, plan_with, resolve, resolve_context_for,
};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::EngineCfg;
use crate::error::StoreError;
use crate::store::{AppendResult, PlanWrite, QuestStore};

/// Outcome of `ensure_plan_if_missing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// A plan was already stored, possibly by a concurrent pass.
    Existing { events: usize },
    Created { events: usize },
}

impl PlanStatus {
    #[must_use]
    pub const fn events(self) -> usize {
        match self {
            Self::Existing { events } | Self::Created { events } => events,
        }
    }
}

/// One line of the adventure feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedLine {
    pub idx: u32,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub message: String,
    pub xp_delta: i64,
    pub gold_delta: i64,
    pub won: Option<bool>,
}

impl From<&QuestEvent> for FeedLine {
    fn from(event: &QuestEvent) -> Self {
        let won = match event.outcome {
            EventOutcome::None => None,
            EventOutcome::Win { .. } => Some(true),
            EventOutcome::Flee { .. } => Some(false),
        };
        Self {
            idx: event.idx,
            at: event.at,
            kind: event.kind,
            message: event.message.clone(),
            xp_delta: event.xp_delta,
            gold_delta: event.gold_delta,
            won,
        }
    }
}

pub type FeedPreview = SmallVec<[FeedLine; 5]>;

/// Summary of one replay pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub quest_id: QuestId,
    /// Events this pass appended.
    pub appended: u32,
    /// Due events another pass had already appended.
    pub duplicates: u32,
    /// Cursor after the pass.
    pub cursor: Option<u32>,
    /// Most recent events, newest first.
    pub preview: FeedPreview,
    /// Totals over the whole log.
    pub tally: RewardTally,
}

pub struct ReplayEngine {
    quests: Arc<dyn QuestStore>,
    planner: PlannerCfg,
    preview_len: usize,
}

impl ReplayEngine {
    #[must_use]
    pub fn new(quests: Arc<dyn QuestStore>, cfg: &EngineCfg) -> Self {
        Self {
            quests,
            planner: cfg.game.planner.clone(),
            preview_len: cfg.preview_len,
        }
    }

    /// Generate and persist the quest plan unless one is already stored.
    ///
    /// Two concurrent callers may both generate a plan; the store keeps the
    /// first and reports the second as `AlreadyPresent`. Both plans are
    /// identical because generation is a pure function of the quest.
    ///
    /// # Errors
    ///
    /// Propagates store failures; nothing is written on failure.
    pub async fn ensure_plan_if_missing(
        &self,
        hero: &Hero,
        quest: &Quest,
    ) -> Result<PlanStatus, StoreError> {
        let stored = self.quests.plan(&quest.id).await?;
        if !stored.is_empty() {
            return Ok(PlanStatus::Existing {
                events: stored.len(),
            });
        }

        let spec = plan_spec_for(quest, hero.level);
        let plan = plan_with(&quest.id, &spec, &self.planner);
        if plan.is_empty() {
            return Ok(PlanStatus::Existing { events: 0 });
        }
        match self.quests.save_plan(&quest.id, &plan).await? {
            PlanWrite::Inserted => {
                debug!("planned {} events for quest {}", plan.len(), quest.id);
                Ok(PlanStatus::Created { events: plan.len() })
            }
            PlanWrite::AlreadyPresent => {
                debug!("plan for quest {} was written concurrently", quest.id);
                Ok(PlanStatus::Existing { events: plan.len() })
            }
        }
    }

    /// Resolve and append every planned event due at `now` past the cursor.
    ///
    /// # Errors
    ///
    /// Stops at the first failed append and returns the error; events
    /// appended before it stay in the log and the next pass resumes after
    /// them.
    pub async fn replay_due_events(
        &self,
        hero: &Hero,
        quest: &Quest,
        now: DateTime<Utc>,
    ) -> Result<ReplayReport, StoreError> {
        let cursor = self.quests.last_resolved_event_idx(&quest.id).await?;
        let due = self.quests.events_due(&quest.id, now, cursor).await?;
        let ctx = resolve_context_for(quest, hero.level);

        let mut appended = 0_u32;
        let mut duplicates = 0_u32;
        for planned in &due {
            let event = resolve(&ctx, planned, planned.due_at);
            match self.quests.append_event(&event).await {
                Ok(AppendResult::Appended) => {
                    debug!("quest {} event {}: {}", quest.id, event.idx, event.message);
                    appended += 1;
                }
                Ok(AppendResult::Duplicate) => duplicates += 1,
                Err(err) => {
                    warn!(
                        "replay of quest {} stopped at event {}: {err}",
                        quest.id, event.idx
                    );
                    return Err(err);
                }
            }
        }

        let log = self.quests.events(&quest.id).await?;
        let preview = log
            .iter()
            .rev()
            .take(self.preview_len)
            .map(FeedLine::from)
            .collect();
        Ok(ReplayReport {
            quest_id: quest.id.clone(),
            appended,
            duplicates,
            cursor: log.last().map(|event| event.idx),
            preview,
            tally: RewardTally::of(&log),
        })
    }
}
