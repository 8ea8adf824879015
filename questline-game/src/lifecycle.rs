//! Quest lifecycle as a pure reducer over tagged messages.
//!
//! `reduce` never touches storage. It inspects a snapshot of the hero and
//! their latest quest, decides the transition, and returns the effects the
//! runtime must apply. Every effect is safe to apply more than once.
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LifecycleCfg;
use crate::hero::{ClassType, Hero};
use crate::quest::{Quest, QuestId};

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestPhase {
    NoHero,
    Idle,
    Active,
    Completing,
    Completed,
    GaveUp,
    Cooldown,
}

/// Inputs to the reducer. The runtime mints ids before reducing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum Msg {
    Tick,
    Start {
        quest_id: QuestId,
        duration_minutes: u32,
    },
    Complete,
    GiveUp,
}

/// Side effects requested by a transition, applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    CreateHero { class_type: ClassType },
    ClearCooldown,
    InsertQuest { quest: Quest },
    EnsurePlan { quest_id: QuestId },
    ReplayDue { quest_id: QuestId, now: DateTime<Utc> },
    CompleteQuest { quest_id: QuestId },
    StartCooldown { until: DateTime<Utc> },
    AbandonQuest { quest_id: QuestId, at: DateTime<Utc> },
    ScheduleNotification { quest_id: QuestId, at: DateTime<Utc> },
    CancelNotification { quest_id: QuestId },
}

/// Hero plus their most recent quest, as last persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub hero: Option<Hero>,
    pub quest: Option<Quest>,
    /// A completion for `quest` is currently in flight.
    #[serde(default)]
    pub completing: bool,
}

/// Derived display state for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickView {
    pub phase: QuestPhase,
    pub quest_id: Option<QuestId>,
    pub elapsed_secs: i64,
    pub remaining_secs: i64,
    /// Clamped to `[0, 1]`.
    pub progress: f64,
    pub cooldown_remaining_secs: i64,
}

impl TickView {
    fn bare(phase: QuestPhase) -> Self {
        Self {
            phase,
            quest_id: None,
            elapsed_secs: 0,
            remaining_secs: 0,
            progress: 0.0,
            cooldown_remaining_secs: 0,
        }
    }

    fn for_quest(phase: QuestPhase, quest: &Quest, now: DateTime<Utc>) -> Self {
        let progress = quest.progress_at(now);
        Self {
            phase,
            quest_id: Some(quest.id.clone()),
            elapsed_secs: progress.elapsed_secs,
            remaining_secs: progress.remaining_secs,
            progress: progress.fraction,
            cooldown_remaining_secs: 0,
        }
    }
}

/// Reducer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub view: TickView,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn view_only(view: TickView) -> Self {
        Self {
            view,
            effects: Vec::new(),
        }
    }
}

/// Requests rejected without any state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("no hero exists yet")]
    NoHero,
    #[error("quest {0} is already active")]
    QuestAlreadyActive(QuestId),
    #[error("hero is in cooldown until {until}")]
    HeroInCooldown { until: DateTime<Utc> },
    #[error("no active quest")]
    NoActiveQuest,
    #[error("quest {0} is already being completed")]
    CompletionInFlight(QuestId),
    #[error("quest duration must be between 1 and {max} minutes (got {value})")]
    InvalidDuration { value: u32, max: u32 },
}

/// Phase implied by `snapshot` at `now`.
#[must_use]
pub fn phase_of(snapshot: &Snapshot, now: DateTime<Utc>) -> QuestPhase {
    let Some(hero) = snapshot.hero.as_ref() else {
        return QuestPhase::NoHero;
    };
    if let Some(quest) = snapshot.quest.as_ref()
        && quest.is_active()
    {
        return if snapshot.completing {
            QuestPhase::Completing
        } else {
            QuestPhase::Active
        };
    }
    if hero.is_in_cooldown(now) {
        return QuestPhase::Cooldown;
    }
    match snapshot.quest.as_ref() {
        Some(quest) if quest.completed && !hero.cooldown_expired(now) => QuestPhase::Completed,
        _ => QuestPhase::Idle,
    }
}

/// Decide the transition for `msg` at `now`.
///
/// # Errors
///
/// Returns `LifecycleError` when `msg` is not legal in the current phase;
/// a rejected message carries no effects.
pub fn reduce(
    snapshot: &Snapshot,
    msg: &Msg,
    now: DateTime<Utc>,
    cfg: &LifecycleCfg,
) -> Result<Transition, LifecycleError> {
    match msg {
        Msg::Tick => Ok(reduce_tick(snapshot, now, cfg)),
        Msg::Start {
            quest_id,
            duration_minutes,
        } => reduce_start(snapshot, quest_id, *duration_minutes, now, cfg),
        Msg::Complete => reduce_complete(snapshot, now),
        Msg::GiveUp => reduce_give_up(snapshot, now),
    }
}

fn reduce_tick(snapshot: &Snapshot, now: DateTime<Utc>, cfg: &LifecycleCfg) -> Transition {
    let phase = phase_of(snapshot, now);
    match (phase, snapshot.hero.as_ref(), snapshot.quest.as_ref()) {
        (QuestPhase::NoHero, _, _) => Transition {
            view: TickView::bare(QuestPhase::Idle),
            effects: vec![Effect::CreateHero {
                class_type: cfg.default_class,
            }],
        },
        (QuestPhase::Active, _, Some(quest)) => {
            let progress = quest.progress_at(now);
            let mut effects = vec![
                Effect::EnsurePlan {
                    quest_id: quest.id.clone(),
                },
                Effect::ReplayDue {
                    quest_id: quest.id.clone(),
                    now,
                },
            ];
            let phase = if progress.is_due() {
                effects.push(Effect::CompleteQuest {
                    quest_id: quest.id.clone(),
                });
                QuestPhase::Completing
            } else {
                QuestPhase::Active
            };
            Transition {
                view: TickView::for_quest(phase, quest, now),
                effects,
            }
        }
        (QuestPhase::Completing, _, Some(quest)) => {
            Transition::view_only(TickView::for_quest(QuestPhase::Completing, quest, now))
        }
        (QuestPhase::Cooldown, Some(hero), _) => {
            let mut view = TickView::bare(QuestPhase::Cooldown);
            view.cooldown_remaining_secs = hero
                .cooldown_end_time
                .map_or(0, |end| (end - now).num_seconds().max(0));
            Transition::view_only(view)
        }
        (_, Some(hero), _) if hero.cooldown_expired(now) => Transition {
            view: TickView::bare(QuestPhase::Idle),
            effects: vec![Effect::ClearCooldown],
        },
        (phase, _, _) => Transition::view_only(TickView::bare(phase)),
    }
}

fn reduce_start(
    snapshot: &Snapshot,
    quest_id: &QuestId,
    duration_minutes: u32,
    now: DateTime<Utc>,
    cfg: &LifecycleCfg,
) -> Result<Transition, LifecycleError> {
    let hero = snapshot.hero.as_ref().ok_or(LifecycleError::NoHero)?;
    match phase_of(snapshot, now) {
        QuestPhase::Active | QuestPhase::Completing => {
            let active = snapshot
                .quest
                .as_ref()
                .map_or_else(|| quest_id.clone(), |quest| quest.id.clone());
            return Err(LifecycleError::QuestAlreadyActive(active));
        }
        QuestPhase::Cooldown => {
            return Err(LifecycleError::HeroInCooldown {
                until: hero.cooldown_end_time.unwrap_or(now),
            });
        }
        QuestPhase::NoHero => return Err(LifecycleError::NoHero),
        QuestPhase::Idle | QuestPhase::Completed | QuestPhase::GaveUp => {}
    }
    if duration_minutes == 0 || duration_minutes > cfg.max_duration_minutes {
        return Err(LifecycleError::InvalidDuration {
            value: duration_minutes,
            max: cfg.max_duration_minutes,
        });
    }

    let quest = Quest::new(
        quest_id.clone(),
        hero.id.clone(),
        duration_minutes,
        now,
        hero.class_type,
    );
    let mut effects = Vec::with_capacity(4);
    if hero.cooldown_expired(now) {
        effects.push(Effect::ClearCooldown);
    }
    effects.push(Effect::InsertQuest {
        quest: quest.clone(),
    });
    effects.push(Effect::EnsurePlan {
        quest_id: quest.id.clone(),
    });
    effects.push(Effect::ScheduleNotification {
        quest_id: quest.id.clone(),
        at: quest.planned_end(),
    });
    Ok(Transition {
        view: TickView::for_quest(QuestPhase::Active, &quest, now),
        effects,
    })
}

fn reduce_complete(snapshot: &Snapshot, now: DateTime<Utc>) -> Result<Transition, LifecycleError> {
    match (phase_of(snapshot, now), snapshot.quest.as_ref()) {
        (QuestPhase::Active, Some(quest)) => Ok(Transition {
            view: TickView::for_quest(QuestPhase::Completing, quest, now),
            effects: vec![
                Effect::EnsurePlan {
                    quest_id: quest.id.clone(),
                },
                Effect::ReplayDue {
                    quest_id: quest.id.clone(),
                    now,
                },
                Effect::CompleteQuest {
                    quest_id: quest.id.clone(),
                },
            ],
        }),
        (QuestPhase::Completing, Some(quest)) => Ok(Transition::view_only(TickView::for_quest(
            QuestPhase::Completing,
            quest,
            now,
        ))),
        (QuestPhase::Completed, Some(quest)) => Ok(Transition::view_only(TickView::for_quest(
            QuestPhase::Completed,
            quest,
            now,
        ))),
        (QuestPhase::NoHero, _) => Err(LifecycleError::NoHero),
        _ => Err(LifecycleError::NoActiveQuest),
    }
}

fn reduce_give_up(snapshot: &Snapshot, now: DateTime<Utc>) -> Result<Transition, LifecycleError> {
    match (phase_of(snapshot, now), snapshot.quest.as_ref()) {
        (QuestPhase::Active, Some(quest)) => {
            let until = now + TimeDelta::minutes(i64::from(quest.duration_minutes));
            let mut view = TickView::for_quest(QuestPhase::GaveUp, quest, now);
            view.cooldown_remaining_secs = (until - now).num_seconds();
            Ok(Transition {
                view,
                effects: vec![
                    Effect::AbandonQuest {
                        quest_id: quest.id.clone(),
                        at: now,
                    },
                    Effect::StartCooldown { until },
                    Effect::CancelNotification {
                        quest_id: quest.id.clone(),
                    },
                ],
            })
        }
        (QuestPhase::Completing, Some(quest)) => {
            Err(LifecycleError::CompletionInFlight(quest.id.clone()))
        }
        (QuestPhase::NoHero, _) => Err(LifecycleError::NoHero),
        _ => Err(LifecycleError::NoActiveQuest),
    }
}
