//! Quest records, planned slots and the resolved event log.
//!
//! A quest's plan is generated once and never changes; the event log is
//! append-only and keyed by the same `idx` as the plan. Everything the
//! replay engine needs to resume (the cursor) is recoverable from the log.
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hero::{ClassType, HeroId};
use crate::numbers::clamped_ratio;

/// Stable identifier for a quest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestId(pub String);

impl QuestId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single timed focus session framed as an adventure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub hero_id: HeroId,
    pub duration_minutes: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub gave_up: bool,
    #[serde(default)]
    pub server_validated: bool,
    /// Hero class at the moment the quest started.
    #[serde(default)]
    pub class_type: ClassType,
}

impl Quest {
    #[must_use]
    pub const fn new(
        id: QuestId,
        hero_id: HeroId,
        duration_minutes: u32,
        start_time: DateTime<Utc>,
        class_type: ClassType,
    ) -> Self {
        Self {
            id,
            hero_id,
            duration_minutes,
            start_time,
            end_time: None,
            completed: false,
            gave_up: false,
            server_validated: false,
            class_type,
        }
    }

    /// Neither completed nor abandoned.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.completed && !self.gave_up
    }

    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.duration_minutes))
    }

    /// Wall-clock instant at which the quest is due to finish.
    #[must_use]
    pub fn planned_end(&self) -> DateTime<Utc> {
        self.start_time + self.duration()
    }

    /// Elapsed/remaining/progress snapshot at `now`.
    #[must_use]
    pub fn progress_at(&self, now: DateTime<Utc>) -> QuestProgress {
        let total = self.duration().num_seconds();
        let elapsed = (now - self.start_time).num_seconds().max(0);
        QuestProgress {
            elapsed_secs: elapsed,
            remaining_secs: total - elapsed,
            fraction: clamped_ratio(elapsed, total),
        }
    }
}

/// Derived timing of a quest at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub elapsed_secs: i64,
    /// Negative once the quest has overrun its duration.
    pub remaining_secs: i64,
    /// `elapsed / duration`, clamped to `[0, 1]`.
    pub fraction: f64,
}

impl QuestProgress {
    #[must_use]
    pub const fn is_due(&self) -> bool {
        self.remaining_secs <= 0
    }
}

/// Category of a planned slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Chest,
    Trinket,
    Quirky,
    Mob,
    Narration,
}

impl EventKind {
    pub const ALL: [Self; 5] = [
        Self::Chest,
        Self::Trinket,
        Self::Quirky,
        Self::Mob,
        Self::Narration,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Chest => "chest",
            Self::Trinket => "trinket",
            Self::Quirky => "quirky",
            Self::Mob => "mob",
            Self::Narration => "narration",
        }
    }
}

/// Strength band of a mob encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobTier {
    Minion,
    Elite,
    Boss,
}

impl MobTier {
    /// Levels above the hero this tier fights at.
    #[must_use]
    pub const fn level_offset(self) -> u32 {
        match self {
            Self::Minion => 0,
            Self::Elite => 2,
            Self::Boss => 4,
        }
    }

    #[must_use]
    pub const fn reward_multiplier(self) -> i64 {
        match self {
            Self::Minion => 1,
            Self::Elite => 2,
            Self::Boss => 4,
        }
    }
}

/// Scheduled, not-yet-resolved slot in a quest timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedEvent {
    pub quest_id: QuestId,
    /// Zero-based, dense, strictly increasing per quest.
    pub idx: u32,
    pub due_at: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(default)]
    pub is_major: bool,
    /// Only present for `EventKind::Mob`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mob_tier: Option<MobTier>,
}

/// Combat result attached to a resolved mob event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EventOutcome {
    #[default]
    None,
    Win { mob_name: String, mob_level: u32 },
    Flee { mob_name: String, mob_level: u32 },
}

impl EventOutcome {
    #[must_use]
    pub const fn is_win(&self) -> bool {
        matches!(self, Self::Win { .. })
    }

    #[must_use]
    pub fn mob_name(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Win { mob_name, .. } | Self::Flee { mob_name, .. } => Some(mob_name),
        }
    }
}

/// Resolved, persisted outcome of a planned slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestEvent {
    pub quest_id: QuestId,
    pub idx: u32,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    pub message: String,
    pub xp_delta: i64,
    pub gold_delta: i64,
    #[serde(default)]
    pub outcome: EventOutcome,
}

impl QuestEvent {
    /// Equal in everything the resolver decides, ignoring the caller-set timestamp.
    #[must_use]
    pub fn same_resolution(&self, other: &Self) -> bool {
        self.quest_id == other.quest_id
            && self.idx == other.idx
            && self.kind == other.kind
            && self.message == other.message
            && self.xp_delta == other.xp_delta
            && self.gold_delta == other.gold_delta
            && self.outcome == other.outcome
    }
}

/// Highest idx present in a resolved event log.
#[must_use]
pub fn resolution_cursor(events: &[QuestEvent]) -> Option<u32> {
    events.iter().map(|event| event.idx).max()
}

/// Planned slots due at `now` that sit past `cursor`, ascending by idx.
#[must_use]
pub fn due_after(
    plan: &[PlannedEvent],
    cursor: Option<u32>,
    now: DateTime<Utc>,
) -> Vec<PlannedEvent> {
    let mut due: Vec<PlannedEvent> = plan
        .iter()
        .filter(|event| event.due_at <= now && cursor.is_none_or(|c| event.idx > c))
        .cloned()
        .collect();
    due.sort_by_key(|event| event.idx);
    due
}

/// Running totals over a resolved event log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTally {
    pub events: u32,
    pub xp: i64,
    pub gold: i64,
    pub wins: u32,
    pub flees: u32,
}

impl RewardTally {
    #[must_use]
    pub fn of(events: &[QuestEvent]) -> Self {
        events.iter().fold(Self::default(), |mut tally, event| {
            tally.events += 1;
            tally.xp += event.xp_delta;
            tally.gold += event.gold_delta;
            match event.outcome {
                EventOutcome::Win { .. } => tally.wins += 1,
                EventOutcome::Flee { .. } => tally.flees += 1,
                EventOutcome::None => {}
            }
            tally
        })
    }
}
