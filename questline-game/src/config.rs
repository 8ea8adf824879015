//! Tunable configuration for planning, levelling, loot and lifecycle rules.
//!
//! Every field has a serde default so partial JSON documents stay valid;
//! `validate` rejects values outside the documented bounds.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    LOOT_GOLD_PER_MINUTE, LOOT_XP_PER_MINUTE, MAX_QUEST_MINUTES, PLANNER_AFFINITY_BONUS,
    PLANNER_COUNT_JITTER, PLANNER_MAJOR_PCT, PLANNER_MAX_EVENTS, PLANNER_MINUTES_PER_EVENT,
};
use crate::hero::{ClassType, LevelCurve};
use crate::quest::EventKind;

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },
    #[error("event weights must not all be zero")]
    EmptyWeights,
    #[error("invalid configuration document: {0}")]
    Parse(String),
}

/// Base selection weight per event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindWeights {
    #[serde(default = "KindWeights::default_chest")]
    pub chest: u32,
    #[serde(default = "KindWeights::default_trinket")]
    pub trinket: u32,
    #[serde(default = "KindWeights::default_quirky")]
    pub quirky: u32,
    #[serde(default = "KindWeights::default_mob")]
    pub mob: u32,
    #[serde(default = "KindWeights::default_narration")]
    pub narration: u32,
}

impl KindWeights {
    const fn default_chest() -> u32 {
        20
    }

    const fn default_trinket() -> u32 {
        15
    }

    const fn default_quirky() -> u32 {
        15
    }

    const fn default_mob() -> u32 {
        30
    }

    const fn default_narration() -> u32 {
        20
    }

    #[must_use]
    pub const fn weight(&self, kind: EventKind) -> u32 {
        match kind {
            EventKind::Chest => self.chest,
            EventKind::Trinket => self.trinket,
            EventKind::Quirky => self.quirky,
            EventKind::Mob => self.mob,
            EventKind::Narration => self.narration,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        EventKind::ALL
            .iter()
            .map(|kind| u64::from(self.weight(*kind)))
            .sum()
    }
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            chest: Self::default_chest(),
            trinket: Self::default_trinket(),
            quirky: Self::default_quirky(),
            mob: Self::default_mob(),
            narration: Self::default_narration(),
        }
    }
}

/// Planner pacing and weighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerCfg {
    #[serde(default = "PlannerCfg::default_minutes_per_event")]
    pub minutes_per_event: u32,
    /// Maximum +/- deviation from the paced event count.
    #[serde(default = "PlannerCfg::default_count_jitter")]
    pub count_jitter: u32,
    #[serde(default = "PlannerCfg::default_max_events")]
    pub max_events: u32,
    /// Chance, in percent, that a non-final slot is major.
    #[serde(default = "PlannerCfg::default_major_pct")]
    pub major_pct: u32,
    /// Extra weight given to the hero class's affinity kind.
    #[serde(default = "PlannerCfg::default_affinity_bonus")]
    pub affinity_bonus: u32,
    #[serde(default)]
    pub weights: KindWeights,
}

impl PlannerCfg {
    const fn default_minutes_per_event() -> u32 {
        PLANNER_MINUTES_PER_EVENT
    }

    const fn default_count_jitter() -> u32 {
        PLANNER_COUNT_JITTER
    }

    const fn default_max_events() -> u32 {
        PLANNER_MAX_EVENTS
    }

    const fn default_major_pct() -> u32 {
        PLANNER_MAJOR_PCT
    }

    const fn default_affinity_bonus() -> u32 {
        PLANNER_AFFINITY_BONUS
    }

    /// Validate planner bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when pacing is zero, the major chance exceeds
    /// 100 percent, or every kind weight is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minutes_per_event == 0 {
            return Err(ConfigError::MinViolation {
                field: "planner.minutes_per_event",
                min: 1,
                value: 0,
            });
        }
        if !(1..=1_000).contains(&self.max_events) {
            return Err(ConfigError::RangeViolation {
                field: "planner.max_events",
                min: 1,
                max: 1_000,
                value: u64::from(self.max_events),
            });
        }
        if self.major_pct > 100 {
            return Err(ConfigError::RangeViolation {
                field: "planner.major_pct",
                min: 0,
                max: 100,
                value: u64::from(self.major_pct),
            });
        }
        if self.weights.total() == 0 {
            return Err(ConfigError::EmptyWeights);
        }
        Ok(())
    }
}

impl Default for PlannerCfg {
    fn default() -> Self {
        Self {
            minutes_per_event: Self::default_minutes_per_event(),
            count_jitter: Self::default_count_jitter(),
            max_events: Self::default_max_events(),
            major_pct: Self::default_major_pct(),
            affinity_bonus: Self::default_affinity_bonus(),
            weights: KindWeights::default(),
        }
    }
}

/// Offline loot rates used when no remote validator is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootCfg {
    #[serde(default = "LootCfg::default_xp_per_minute")]
    pub xp_per_minute: u64,
    #[serde(default = "LootCfg::default_gold_per_minute")]
    pub gold_per_minute: u64,
}

impl LootCfg {
    const fn default_xp_per_minute() -> u64 {
        LOOT_XP_PER_MINUTE
    }

    const fn default_gold_per_minute() -> u64 {
        LOOT_GOLD_PER_MINUTE
    }
}

impl Default for LootCfg {
    fn default() -> Self {
        Self {
            xp_per_minute: Self::default_xp_per_minute(),
            gold_per_minute: Self::default_gold_per_minute(),
        }
    }
}

/// Rules governing hero creation and quest starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleCfg {
    /// Class assigned to an auto-created hero.
    #[serde(default)]
    pub default_class: ClassType,
    #[serde(default = "LifecycleCfg::default_max_duration_minutes")]
    pub max_duration_minutes: u32,
}

impl LifecycleCfg {
    const fn default_max_duration_minutes() -> u32 {
        MAX_QUEST_MINUTES
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_QUEST_MINUTES).contains(&self.max_duration_minutes) {
            return Err(ConfigError::RangeViolation {
                field: "lifecycle.max_duration_minutes",
                min: 1,
                max: u64::from(MAX_QUEST_MINUTES),
                value: u64::from(self.max_duration_minutes),
            });
        }
        Ok(())
    }
}

impl Default for LifecycleCfg {
    fn default() -> Self {
        Self {
            default_class: ClassType::default(),
            max_duration_minutes: Self::default_max_duration_minutes(),
        }
    }
}

/// Aggregate game configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCfg {
    #[serde(default)]
    pub planner: PlannerCfg,
    #[serde(default)]
    pub levels: LevelCurve,
    #[serde(default)]
    pub loot: LootCfg,
    #[serde(default)]
    pub lifecycle: LifecycleCfg,
}

impl GameCfg {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON and any validation
    /// error raised by the parsed sections.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.planner.validate()?;
        self.levels.validate()?;
        self.lifecycle.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg = GameCfg::from_json("{}").expect("defaults are valid");
        assert_eq!(cfg, GameCfg::default());
        assert_eq!(cfg.planner.minutes_per_event, 3);
        assert_eq!(cfg.lifecycle.default_class, ClassType::Warrior);
    }

    #[test]
    fn partial_documents_override_only_named_fields() {
        let cfg = GameCfg::from_json(
            r#"{
                "planner": {"count_jitter": 0, "weights": {"mob": 50}},
                "lifecycle": {"default_class": "rogue"}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.planner.count_jitter, 0);
        assert_eq!(cfg.planner.weights.mob, 50);
        assert_eq!(cfg.planner.weights.chest, 20);
        assert_eq!(cfg.lifecycle.default_class, ClassType::Rogue);
    }

    #[test]
    fn zero_pacing_is_rejected() {
        let cfg = PlannerCfg {
            minutes_per_event: 0,
            ..PlannerCfg::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MinViolation { field, .. }) if field == "planner.minutes_per_event"
        ));
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let cfg = PlannerCfg {
            weights: KindWeights {
                chest: 0,
                trinket: 0,
                quirky: 0,
                mob: 0,
                narration: 0,
            },
            ..PlannerCfg::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyWeights));
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        assert!(matches!(
            GameCfg::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            GameCfg::from_json(r#"{"levels": {"xp_per_level": 0}}"#),
            Err(ConfigError::MinViolation { field, .. }) if field == "levels.xp_per_level"
        ));
    }
}
