//! Hero aggregates, classes and the levelling curve.
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::constants::XP_PER_LEVEL;
use crate::quest::EventKind;

/// Stable identifier for a hero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeroId(pub String);

impl HeroId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HeroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hero archetype. Biases event selection and combat odds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassType {
    #[default]
    Warrior,
    Mage,
    Rogue,
    Ranger,
}

impl ClassType {
    pub const ALL: [Self; 4] = [Self::Warrior, Self::Mage, Self::Rogue, Self::Ranger];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Warrior => "warrior",
            Self::Mage => "mage",
            Self::Rogue => "rogue",
            Self::Ranger => "ranger",
        }
    }

    /// Event kind this class tends to run into more often.
    #[must_use]
    pub const fn affinity(self) -> EventKind {
        match self {
            Self::Warrior => EventKind::Mob,
            Self::Mage => EventKind::Quirky,
            Self::Rogue => EventKind::Chest,
            Self::Ranger => EventKind::Trinket,
        }
    }

    /// Flat bonus added to the combat win chance, in percent.
    #[must_use]
    pub const fn combat_bonus_pct(self) -> i64 {
        match self {
            Self::Warrior => 10,
            Self::Ranger => 5,
            Self::Mage => 3,
            Self::Rogue => 0,
        }
    }

    /// Bonus applied to validated loot, in percent.
    #[must_use]
    pub const fn loot_bonus_pct(self) -> u64 {
        match self {
            Self::Rogue => 15,
            Self::Mage | Self::Ranger => 5,
            Self::Warrior => 0,
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown class label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown class '{0}'")]
pub struct UnknownClass(pub String);

impl FromStr for ClassType {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|class| class.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownClass(needle.to_string()))
    }
}

/// Authoritative reward granted when a quest completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loot {
    pub xp: u64,
    pub gold: u64,
    /// Focus minutes credited to the hero.
    pub focus_minutes: u64,
}

/// Cumulative xp curve: reaching level `L` costs `xp_per_level * L * (L - 1) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCurve {
    #[serde(default = "LevelCurve::default_xp_per_level")]
    pub xp_per_level: u64,
}

impl LevelCurve {
    const fn default_xp_per_level() -> u64 {
        XP_PER_LEVEL
    }

    /// Total xp required to stand at `level`.
    #[must_use]
    pub const fn xp_to_reach(&self, level: u32) -> u64 {
        let level = level as u64;
        if level <= 1 {
            return 0;
        }
        self.xp_per_level
            .saturating_mul(level)
            .saturating_mul(level - 1)
            / 2
    }

    /// Highest level whose threshold `xp` satisfies.
    #[must_use]
    pub fn level_for_xp(&self, xp: u64) -> u32 {
        if self.xp_per_level == 0 {
            return 1;
        }
        let mut level = 1_u32;
        while level < u32::MAX && self.xp_to_reach(level + 1) <= xp {
            level += 1;
        }
        level
    }

    /// Validate the curve.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MinViolation` when the per-level cost is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.xp_per_level == 0 {
            return Err(ConfigError::MinViolation {
                field: "levels.xp_per_level",
                min: 1,
                value: 0,
            });
        }
        Ok(())
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            xp_per_level: Self::default_xp_per_level(),
        }
    }
}

/// Hero aggregate as owned by the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub id: HeroId,
    #[serde(default)]
    pub class_type: ClassType,
    pub level: u32,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub total_focus_minutes: u64,
    #[serde(default)]
    pub in_cooldown: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_end_time: Option<DateTime<Utc>>,
}

impl Hero {
    /// Fresh level-one hero.
    #[must_use]
    pub const fn new(id: HeroId, class_type: ClassType) -> Self {
        Self {
            id,
            class_type,
            level: 1,
            xp: 0,
            gold: 0,
            total_focus_minutes: 0,
            in_cooldown: false,
            cooldown_end_time: None,
        }
    }

    /// True while a cooldown is running at `now`.
    #[must_use]
    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.in_cooldown && self.cooldown_end_time.is_some_and(|end| end > now)
    }

    /// True when a recorded cooldown has elapsed but not been cleared.
    #[must_use]
    pub fn cooldown_expired(&self, now: DateTime<Utc>) -> bool {
        self.in_cooldown && self.cooldown_end_time.is_none_or(|end| end <= now)
    }

    /// Start a cooldown lasting as long as the abandoned quest.
    pub fn start_cooldown(&mut self, now: DateTime<Utc>, duration_minutes: u32) {
        self.in_cooldown = true;
        self.cooldown_end_time = Some(now + TimeDelta::minutes(i64::from(duration_minutes)));
    }

    pub fn clear_cooldown(&mut self) {
        self.in_cooldown = false;
        self.cooldown_end_time = None;
    }

    /// Apply validated loot and recompute the level from total xp.
    pub fn apply_loot(&mut self, loot: &Loot, curve: &LevelCurve) {
        self.xp = self.xp.saturating_add(loot.xp);
        self.gold = self.gold.saturating_add(loot.gold);
        self.total_focus_minutes = self.total_focus_minutes.saturating_add(loot.focus_minutes);
        self.level = curve.level_for_xp(self.xp).max(self.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn level_curve_thresholds_are_triangular() {
        let curve = LevelCurve::default();
        assert_eq!(curve.xp_to_reach(1), 0);
        assert_eq!(curve.xp_to_reach(2), 100);
        assert_eq!(curve.xp_to_reach(3), 300);
        assert_eq!(curve.xp_to_reach(4), 600);
        assert_eq!(curve.level_for_xp(0), 1);
        assert_eq!(curve.level_for_xp(99), 1);
        assert_eq!(curve.level_for_xp(100), 2);
        assert_eq!(curve.level_for_xp(599), 3);
        assert_eq!(curve.level_for_xp(600), 4);
    }

    #[test]
    fn apply_loot_accumulates_and_levels_up() {
        let mut hero = Hero::new(HeroId::new("h-1"), ClassType::Mage);
        let loot = Loot {
            xp: 320,
            gold: 40,
            focus_minutes: 25,
        };
        hero.apply_loot(&loot, &LevelCurve::default());
        assert_eq!(hero.xp, 320);
        assert_eq!(hero.gold, 40);
        assert_eq!(hero.total_focus_minutes, 25);
        assert_eq!(hero.level, 3);
    }

    #[test]
    fn cooldown_window_tracks_duration() {
        let mut hero = Hero::new(HeroId::new("h-2"), ClassType::Warrior);
        hero.start_cooldown(t0(), 25);
        assert_eq!(hero.cooldown_end_time, Some(t0() + TimeDelta::seconds(25 * 60)));
        assert!(hero.is_in_cooldown(t0() + TimeDelta::minutes(24)));
        assert!(!hero.cooldown_expired(t0() + TimeDelta::minutes(24)));
        assert!(hero.cooldown_expired(t0() + TimeDelta::minutes(25)));
        hero.clear_cooldown();
        assert!(!hero.in_cooldown);
        assert!(hero.cooldown_end_time.is_none());
    }

    #[test]
    fn class_labels_parse_case_insensitively() {
        assert_eq!("RANGER".parse::<ClassType>(), Ok(ClassType::Ranger));
        assert_eq!(" mage ".parse::<ClassType>(), Ok(ClassType::Mage));
        assert!("bard".parse::<ClassType>().is_err());
    }
}
