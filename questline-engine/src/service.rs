//! Executes lifecycle transitions against the collaborators.
//!
//! Every message goes through the same pipeline: load a snapshot, ask the
//! pure reducer for a transition, then apply its effects in order. Effects
//! are individually idempotent, so a pipeline interrupted at any point can
//! simply run again on the next tick.
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use questline_game::{
    Effect, Hero, HeroId, LifecycleError, Loot, Msg, QuestPhase, Quest, QuestId, Snapshot,
    TickView, reduce,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineCfg;
use crate::error::{EngineError, StoreError};
use crate::replay::{PlanStatus, ReplayEngine, ReplayReport};
use crate::store::{
    CompletionRequest, HeroStore, Notifier, QuestClosure, QuestStore, RewardValidator,
};

/// The external systems a service talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub heroes: Arc<dyn HeroStore>,
    pub quests: Arc<dyn QuestStore>,
    pub validator: Arc<dyn RewardValidator>,
    pub notifier: Arc<dyn Notifier>,
}

/// Result of a completion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "completion", rename_all = "snake_case")]
pub enum CompletionReport {
    Completed {
        quest_id: QuestId,
        loot: Loot,
        level: u32,
        leveled_up: bool,
    },
    /// Another completion for the quest is running in this process.
    InFlight { quest_id: QuestId },
    /// The quest was no longer active when the claim was taken.
    AlreadyClosed { quest_id: QuestId },
}

impl CompletionReport {
    #[must_use]
    pub const fn loot(&self) -> Option<&Loot> {
        match self {
            Self::Completed { loot, .. } => Some(loot),
            Self::InFlight { .. } | Self::AlreadyClosed { .. } => None,
        }
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub view: TickView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_created: Option<HeroId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplayReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionReport>,
}

impl TickReport {
    const fn new(view: TickView) -> Self {
        Self {
            view,
            hero_created: None,
            plan: None,
            replay: None,
            completion: None,
        }
    }
}

/// Hero and quest as the pipeline has written them so far.
struct Working {
    hero: Option<Hero>,
    quest: Option<Quest>,
    /// Quest inserted by this pipeline, if any.
    inserted: Option<QuestId>,
}

impl Working {
    fn hero(&self) -> Result<&Hero, EngineError> {
        self.hero.as_ref().ok_or_else(|| LifecycleError::NoHero.into())
    }
}

/// Held while a completion for `quest_id` runs; released on drop.
struct CompletionClaim<'a> {
    claims: &'a Mutex<HashSet<QuestId>>,
    quest_id: QuestId,
}

impl<'a> CompletionClaim<'a> {
    fn acquire(claims: &'a Mutex<HashSet<QuestId>>, quest_id: &QuestId) -> Option<Self> {
        let inserted = claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(quest_id.clone());
        inserted.then(|| Self {
            claims,
            quest_id: quest_id.clone(),
        })
    }
}

impl Drop for CompletionClaim<'_> {
    fn drop(&mut self) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.quest_id);
    }
}

pub struct QuestService {
    heroes: Arc<dyn HeroStore>,
    quests: Arc<dyn QuestStore>,
    validator: Arc<dyn RewardValidator>,
    notifier: Arc<dyn Notifier>,
    replay: ReplayEngine,
    cfg: EngineCfg,
    completions: Mutex<HashSet<QuestId>>,
}

impl QuestService {
    #[must_use]
    pub fn new(collaborators: Collaborators, cfg: EngineCfg) -> Self {
        let replay = ReplayEngine::new(Arc::clone(&collaborators.quests), &cfg);
        Self {
            heroes: collaborators.heroes,
            quests: collaborators.quests,
            validator: collaborators.validator,
            notifier: collaborators.notifier,
            replay,
            cfg,
            completions: Mutex::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineCfg {
        &self.cfg
    }

    #[must_use]
    pub const fn replay_engine(&self) -> &ReplayEngine {
        &self.replay
    }

    fn completion_in_flight(&self, quest_id: &QuestId) -> bool {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(quest_id)
    }

    /// Current hero and latest quest as persisted.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let hero = self.heroes.current_hero().await?;
        let quest = match hero.as_ref() {
            Some(hero) => self.quests.latest_quest(&hero.id).await?,
            None => None,
        };
        let completing = quest
            .as_ref()
            .is_some_and(|quest| self.completion_in_flight(&quest.id));
        Ok(Snapshot {
            hero,
            quest,
            completing,
        })
    }

    /// Periodic observation: creates the hero, catches up the feed,
    /// completes due quests and clears elapsed cooldowns.
    ///
    /// # Errors
    ///
    /// See [`QuestService::handle`].
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        self.handle(&Msg::Tick, now).await
    }

    /// Start a quest under a freshly minted id.
    ///
    /// # Errors
    ///
    /// See [`QuestService::handle`].
    pub async fn start_quest(
        &self,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        let msg = Msg::Start {
            quest_id: QuestId::new(Uuid::new_v4().to_string()),
            duration_minutes,
        };
        self.handle(&msg, now).await
    }

    /// # Errors
    ///
    /// See [`QuestService::handle`].
    pub async fn complete(&self, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        self.handle(&Msg::Complete, now).await
    }

    /// # Errors
    ///
    /// See [`QuestService::handle`].
    pub async fn give_up(&self, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        self.handle(&Msg::GiveUp, now).await
    }

    /// Reduce `msg` against the persisted state and apply the effects.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Lifecycle` when the message is illegal in the
    /// current phase (nothing is written), and store or validation errors
    /// raised while applying effects. Effects applied before the failure
    /// remain and are safe to apply again.
    pub async fn handle(&self, msg: &Msg, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        let snapshot = self.snapshot().await?;
        let transition = reduce(&snapshot, msg, now, &self.cfg.game.lifecycle)?;
        let mut working = Working {
            hero: snapshot.hero,
            quest: snapshot.quest,
            inserted: None,
        };
        let mut report = TickReport::new(transition.view);
        for effect in transition.effects {
            self.apply(effect, now, &mut working, &mut report).await?;
        }
        Ok(report)
    }

    async fn apply(
        &self,
        effect: Effect,
        now: DateTime<Utc>,
        working: &mut Working,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        match effect {
            Effect::CreateHero { class_type } => {
                let fresh = Hero::new(HeroId::new(Uuid::new_v4().to_string()), class_type);
                let stored = self.heroes.insert_hero(fresh).await?;
                info!("hero {} ({}) ready", stored.id, stored.class_type);
                report.hero_created = Some(stored.id.clone());
                working.hero = Some(stored);
            }
            Effect::ClearCooldown => {
                let mut hero = working.hero()?.clone();
                hero.clear_cooldown();
                self.heroes.update_hero(&hero).await?;
                info!("hero {} cooldown cleared", hero.id);
                working.hero = Some(hero);
            }
            Effect::InsertQuest { quest } => {
                self.insert_quest(&quest).await?;
                info!(
                    "quest {} started: {} minutes as {}",
                    quest.id, quest.duration_minutes, quest.class_type
                );
                working.inserted = Some(quest.id.clone());
                working.quest = Some(quest);
            }
            Effect::EnsurePlan { quest_id } => {
                let quest = self.working_quest(working, &quest_id).await?;
                match self
                    .replay
                    .ensure_plan_if_missing(working.hero()?, &quest)
                    .await
                {
                    Ok(status) => report.plan = Some(status),
                    // The quest is already stored; the next tick plans it.
                    Err(err) if working.inserted.as_ref() == Some(&quest_id) => {
                        warn!("plan for new quest {quest_id} deferred: {err}");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Effect::ReplayDue { quest_id, now } => {
                let quest = self.working_quest(working, &quest_id).await?;
                let replay = self
                    .replay
                    .replay_due_events(working.hero()?, &quest, now)
                    .await?;
                if replay.appended > 0 {
                    debug!(
                        "quest {} caught up {} events (cursor {:?})",
                        quest_id, replay.appended, replay.cursor
                    );
                }
                report.replay = Some(replay);
            }
            Effect::CompleteQuest { quest_id } => {
                let completion = self.complete_quest(&quest_id, now).await?;
                if let CompletionReport::Completed { .. } = completion {
                    report.view.phase = QuestPhase::Completed;
                    working.hero = self.heroes.current_hero().await?;
                }
                report.completion = Some(completion);
            }
            Effect::AbandonQuest { quest_id, at } => {
                let closed = self
                    .quests
                    .close_quest(&quest_id, QuestClosure::GaveUp { at })
                    .await?;
                if !closed {
                    // Closed elsewhere between snapshot and write.
                    return Err(LifecycleError::NoActiveQuest.into());
                }
                info!("quest {quest_id} abandoned at {at}");
            }
            Effect::StartCooldown { until } => {
                let mut hero = self
                    .heroes
                    .current_hero()
                    .await?
                    .ok_or(LifecycleError::NoHero)?;
                hero.in_cooldown = true;
                hero.cooldown_end_time = Some(until);
                self.heroes.update_hero(&hero).await?;
                working.hero = Some(hero);
            }
            Effect::ScheduleNotification { quest_id, at } => {
                if let Err(err) = self.notifier.schedule_quest_end(&quest_id, at).await {
                    warn!("could not schedule end of quest {quest_id}: {err}");
                }
            }
            Effect::CancelNotification { quest_id } => {
                self.cancel_notification(&quest_id).await;
            }
        }
        Ok(())
    }

    async fn insert_quest(&self, quest: &Quest) -> Result<(), EngineError> {
        match self.quests.insert_quest(quest).await {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(reason)) => {
                match self.quests.active_quest(&quest.hero_id).await? {
                    Some(active) => Err(LifecycleError::QuestAlreadyActive(active.id).into()),
                    None => Err(StoreError::Conflict(reason).into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn working_quest(
        &self,
        working: &Working,
        quest_id: &QuestId,
    ) -> Result<Quest, EngineError> {
        if let Some(quest) = working.quest.as_ref()
            && &quest.id == quest_id
        {
            return Ok(quest.clone());
        }
        self.quests
            .quest(quest_id)
            .await?
            .ok_or_else(|| StoreError::QuestNotFound(quest_id.clone()).into())
    }

    async fn cancel_notification(&self, quest_id: &QuestId) {
        if let Err(err) = self.notifier.cancel_quest_end(quest_id).await {
            warn!("could not cancel end notification for quest {quest_id}: {err}");
        }
    }

    /// Complete an active quest at most once.
    ///
    /// The claim keeps concurrent callers in this process out; the store's
    /// compare-and-set close keeps out everyone else. Loot is applied only
    /// by the caller whose close succeeded.
    ///
    /// # Errors
    ///
    /// Returns validation errors with the quest left active, and store
    /// errors from any step.
    pub async fn complete_quest(
        &self,
        quest_id: &QuestId,
        now: DateTime<Utc>,
    ) -> Result<CompletionReport, EngineError> {
        let Some(_claim) = CompletionClaim::acquire(&self.completions, quest_id) else {
            debug!("completion of quest {quest_id} already in flight");
            return Ok(CompletionReport::InFlight {
                quest_id: quest_id.clone(),
            });
        };

        let quest = self
            .quests
            .quest(quest_id)
            .await?
            .ok_or_else(|| StoreError::QuestNotFound(quest_id.clone()))?;
        if !quest.is_active() {
            return Ok(CompletionReport::AlreadyClosed {
                quest_id: quest_id.clone(),
            });
        }
        let mut hero = self
            .heroes
            .current_hero()
            .await?
            .ok_or(LifecycleError::NoHero)?;

        let request = CompletionRequest {
            hero_id: quest.hero_id.clone(),
            quest_id: quest.id.clone(),
            duration_minutes: quest.duration_minutes,
            start_time: quest.start_time,
            end_time: now,
            class_type: quest.class_type,
        };
        let loot = self.validator.complete_quest(&request).await.map_err(|err| {
            warn!("quest {quest_id} stays active: {err}");
            err
        })?;

        let closure = QuestClosure::Completed {
            at: now,
            server_validated: true,
        };
        if !self.quests.close_quest(quest_id, closure).await? {
            return Ok(CompletionReport::AlreadyClosed {
                quest_id: quest_id.clone(),
            });
        }

        let level_before = hero.level;
        hero.apply_loot(&loot, &self.cfg.game.levels);
        self.heroes.update_hero(&hero).await?;
        self.cancel_notification(quest_id).await;
        info!(
            "quest {quest_id} completed: +{} xp, +{} gold, level {}",
            loot.xp, loot.gold, hero.level
        );
        Ok(CompletionReport::Completed {
            quest_id: quest_id.clone(),
            loot,
            level: hero.level,
            leveled_up: hero.level > level_before,
        })
    }
}
