//! Quest planner: seed and quest parameters to an ordered slot timeline.
//!
//! Planning is pure. Three independent ChaCha streams (count, timing, kind)
//! are derived from the quest seed, so identical inputs always yield an
//! identical plan on any platform.
use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::config::PlannerCfg;
use crate::constants::{
    ELITE_BASE_PCT, ELITE_MAX_PCT, ELITE_PCT_PER_LEVEL, PLANNER_LEVEL_MOB_BONUS_CAP,
    STREAM_PLAN_COUNT, STREAM_PLAN_KIND, STREAM_PLAN_TIMING,
};
use crate::hero::ClassType;
use crate::quest::{EventKind, MobTier, PlannedEvent, QuestId};
use crate::seed::derive_stream_seed;

/// Inputs that fully determine a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSpec {
    pub duration_minutes: u32,
    pub seed: u64,
    pub start_at: DateTime<Utc>,
    pub hero_level: u32,
    pub class_type: ClassType,
}

/// Plan a quest with the default planner configuration.
#[must_use]
pub fn plan(quest_id: &QuestId, spec: &PlanSpec) -> Vec<PlannedEvent> {
    plan_with(quest_id, spec, &PlannerCfg::default())
}

/// Plan a quest.
///
/// The window `[start_at, start_at + duration]` is cut into equal slots and
/// each event lands at a seeded offset inside its own slot, which keeps
/// `due_at` non-decreasing in `idx`. The final slot is always major.
#[must_use]
pub fn plan_with(quest_id: &QuestId, spec: &PlanSpec, cfg: &PlannerCfg) -> Vec<PlannedEvent> {
    let total_secs = i64::from(spec.duration_minutes) * 60;
    if total_secs == 0 {
        return Vec::new();
    }

    let mut count_rng = stream(spec.seed, STREAM_PLAN_COUNT);
    let mut timing_rng = stream(spec.seed, STREAM_PLAN_TIMING);
    let mut kind_rng = stream(spec.seed, STREAM_PLAN_KIND);

    let count = event_count(spec.duration_minutes, total_secs, cfg, &mut count_rng);
    let weights = kind_weights(spec, cfg);
    let slots = i64::from(count);

    (0..count)
        .map(|idx| {
            let slot = i64::from(idx);
            let slot_start = slot * total_secs / slots;
            let slot_end = (slot + 1) * total_secs / slots;
            let offset = timing_rng.gen_range(slot_start..=slot_end);

            let kind = choose_kind(&weights, &mut kind_rng);
            let major_roll = kind_rng.gen_range(0..100_u32);
            let is_major = idx + 1 == count || major_roll < cfg.major_pct;
            let mob_tier = (kind == EventKind::Mob)
                .then(|| choose_tier(is_major, spec.hero_level, &mut kind_rng));

            PlannedEvent {
                quest_id: quest_id.clone(),
                idx,
                due_at: spec.start_at + TimeDelta::seconds(offset),
                kind,
                is_major,
                mob_tier,
            }
        })
        .collect()
}

fn stream(seed: u64, tag: &[u8]) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, tag))
}

fn event_count<R: Rng>(
    duration_minutes: u32,
    total_secs: i64,
    cfg: &PlannerCfg,
    rng: &mut R,
) -> u32 {
    let paced = i64::from((duration_minutes / cfg.minutes_per_event.max(1)).max(1));
    let jitter = i64::from(cfg.count_jitter);
    let delta = if jitter == 0 {
        0
    } else {
        rng.gen_range(-jitter..=jitter)
    };
    let ceiling = i64::from(cfg.max_events.max(1)).min(total_secs);
    u32::try_from((paced + delta).clamp(1, ceiling)).unwrap_or(1)
}

fn kind_weights(spec: &PlanSpec, cfg: &PlannerCfg) -> Vec<(EventKind, u32)> {
    let affinity = spec.class_type.affinity();
    let level_bonus = spec.hero_level.min(PLANNER_LEVEL_MOB_BONUS_CAP);
    EventKind::ALL
        .iter()
        .map(|&kind| {
            let mut weight = cfg.weights.weight(kind);
            if weight > 0 && kind == affinity {
                weight = weight.saturating_add(cfg.affinity_bonus);
            }
            if weight > 0 && kind == EventKind::Mob {
                weight = weight.saturating_add(level_bonus);
            }
            (kind, weight)
        })
        .collect()
}

fn choose_kind<R: Rng>(weights: &[(EventKind, u32)], rng: &mut R) -> EventKind {
    let total: u64 = weights.iter().map(|(_, weight)| u64::from(*weight)).sum();
    if total == 0 {
        return EventKind::Narration;
    }
    let mut roll = rng.gen_range(0..total);
    for &(kind, weight) in weights {
        let weight = u64::from(weight);
        if roll < weight {
            return kind;
        }
        roll -= weight;
    }
    EventKind::Narration
}

fn choose_tier<R: Rng>(is_major: bool, hero_level: u32, rng: &mut R) -> MobTier {
    if is_major {
        return MobTier::Boss;
    }
    let elite_pct = hero_level
        .saturating_mul(ELITE_PCT_PER_LEVEL)
        .saturating_add(ELITE_BASE_PCT)
        .min(ELITE_MAX_PCT);
    if rng.gen_range(0..100_u32) < elite_pct {
        MobTier::Elite
    } else {
        MobTier::Minion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn spec(seed: u64) -> PlanSpec {
        PlanSpec {
            duration_minutes: 25,
            seed,
            start_at: t0(),
            hero_level: 1,
            class_type: ClassType::Warrior,
        }
    }

    #[test]
    fn identical_spec_yields_identical_plan() {
        let quest_id = QuestId::new("quest-42");
        let first = plan(&quest_id, &spec(42));
        let second = plan(&quest_id, &spec(42));
        assert_eq!(first, second);
        assert!((7..=9).contains(&first.len()), "len {}", first.len());
    }

    #[test]
    fn plan_is_dense_chronological_and_bounded() {
        let quest_id = QuestId::new("quest-bounds");
        for seed in 0..64 {
            let spec = spec(seed);
            let events = plan(&quest_id, &spec);
            let end = spec.start_at + TimeDelta::minutes(25);
            for (position, event) in events.iter().enumerate() {
                assert_eq!(event.idx as usize, position);
                assert!(event.due_at >= spec.start_at && event.due_at <= end);
                assert_eq!(event.mob_tier.is_some(), event.kind == EventKind::Mob);
            }
            for pair in events.windows(2) {
                assert!(pair[0].due_at <= pair[1].due_at);
            }
            assert!(events.last().is_some_and(|event| event.is_major));
        }
    }

    #[test]
    fn zero_duration_plans_nothing() {
        let spec = PlanSpec {
            duration_minutes: 0,
            ..spec(7)
        };
        assert!(plan(&QuestId::new("empty"), &spec).is_empty());
    }

    #[test]
    fn fixed_pacing_without_jitter_gives_exact_count() {
        let cfg = PlannerCfg {
            count_jitter: 0,
            ..PlannerCfg::default()
        };
        let spec = PlanSpec {
            duration_minutes: 30,
            ..spec(9)
        };
        assert_eq!(plan_with(&QuestId::new("ten"), &spec, &cfg).len(), 10);

        let one_minute = PlanSpec {
            duration_minutes: 1,
            ..spec
        };
        assert_eq!(plan_with(&QuestId::new("one"), &one_minute, &cfg).len(), 1);
    }

    #[test]
    fn different_seeds_diverge() {
        let quest_id = QuestId::new("quest-div");
        assert_ne!(plan(&quest_id, &spec(42)), plan(&quest_id, &spec(43)));
    }

    #[test]
    fn major_mobs_are_bosses() {
        let quest_id = QuestId::new("quest-boss");
        for seed in 0..64 {
            for event in plan(&quest_id, &spec(seed)) {
                if event.kind == EventKind::Mob && event.is_major {
                    assert_eq!(event.mob_tier, Some(MobTier::Boss));
                }
                if event.mob_tier == Some(MobTier::Boss) {
                    assert!(event.is_major);
                }
            }
        }
    }

    #[test]
    fn class_affinity_shifts_distribution() {
        let quest_id = QuestId::new("quest-affinity");
        let count_kind = |class_type: ClassType, kind: EventKind| -> usize {
            (0..200)
                .flat_map(|seed| {
                    plan(
                        &quest_id,
                        &PlanSpec {
                            class_type,
                            ..spec(seed)
                        },
                    )
                })
                .filter(|event| event.kind == kind)
                .count()
        };
        assert!(
            count_kind(ClassType::Warrior, EventKind::Mob)
                > count_kind(ClassType::Rogue, EventKind::Mob)
        );
        assert!(
            count_kind(ClassType::Rogue, EventKind::Chest)
                > count_kind(ClassType::Warrior, EventKind::Chest)
        );
    }

    #[test]
    fn zero_weight_kinds_never_appear() {
        let mut cfg = PlannerCfg::default();
        cfg.weights.mob = 0;
        let quest_id = QuestId::new("quest-nomob");
        for seed in 0..32 {
            assert!(
                plan_with(&quest_id, &spec(seed), &cfg)
                    .iter()
                    .all(|event| event.kind != EventKind::Mob)
            );
        }
    }
}
