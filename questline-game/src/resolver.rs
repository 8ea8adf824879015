//! Quest resolver: one planned slot to one resolved event.
//!
//! Resolution draws from a ChaCha stream keyed by the quest seed and the
//! slot index, so the same `(context, slot)` pair always resolves to the same
//! message, rewards and combat outcome. The caller supplies the timestamp.
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    BOSS_NAMES, CHEST_GOLD_RANGE, CHEST_LINES, CHEST_XP, ELITE_NAMES, LEVEL_SCALE_STEP,
    MAJOR_REWARD_MULTIPLIER, MINION_NAMES, MOB_BASE_WIN_PCT, MOB_FLEE_XP, MOB_GOLD_RANGE,
    MOB_LEVEL_DIFF_PCT, MOB_MAX_WIN_PCT, MOB_MIN_WIN_PCT, MOB_XP_PER_LEVEL, NARRATION_LINES,
    NARRATION_XP, QUIRKY_LINES, QUIRKY_XP_RANGE, TRINKET_GOLD_RANGE, TRINKET_XP_RANGE, TRINKETS,
};
use crate::hero::ClassType;
use crate::numbers::pick;
use crate::quest::{EventKind, EventOutcome, MobTier, PlannedEvent, QuestEvent, QuestId};
use crate::seed::event_stream_seed;

/// Everything besides the slot itself that resolution depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveContext {
    pub quest_id: QuestId,
    pub base_seed: u64,
    pub hero_level: u32,
    pub class_type: ClassType,
}

/// Result of the deterministic combat check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatCheck {
    pub mob_level: u32,
    pub win_pct: i64,
    pub roll: i64,
}

impl CombatCheck {
    #[must_use]
    pub const fn won(&self) -> bool {
        self.roll < self.win_pct
    }
}

struct Resolution {
    message: String,
    xp: i64,
    gold: i64,
    outcome: EventOutcome,
}

/// Resolve `event` into a quest event stamped with `at`.
#[must_use]
pub fn resolve(ctx: &ResolveContext, event: &PlannedEvent, at: DateTime<Utc>) -> QuestEvent {
    let mut rng = ChaCha20Rng::seed_from_u64(event_stream_seed(ctx.base_seed, event.idx));
    let scale = level_scale(ctx.hero_level);

    let mut resolution = match event.kind {
        EventKind::Chest => resolve_chest(scale, &mut rng),
        EventKind::Trinket => resolve_trinket(scale, &mut rng),
        EventKind::Quirky => resolve_quirky(&mut rng),
        EventKind::Narration => resolve_narration(&mut rng),
        EventKind::Mob => resolve_mob(ctx, event.mob_tier.unwrap_or(MobTier::Minion), &mut rng),
    };

    if event.is_major && event.kind != EventKind::Mob {
        resolution.xp *= MAJOR_REWARD_MULTIPLIER;
        resolution.gold *= MAJOR_REWARD_MULTIPLIER;
        resolution.message = format!("Major find! {}", resolution.message);
    }

    QuestEvent {
        quest_id: ctx.quest_id.clone(),
        idx: event.idx,
        at,
        kind: event.kind,
        message: resolution.message,
        xp_delta: resolution.xp,
        gold_delta: resolution.gold,
        outcome: resolution.outcome,
    }
}

/// Run the combat check for a mob of `tier` without resolving rewards.
pub fn combat_check<R: Rng>(ctx: &ResolveContext, tier: MobTier, rng: &mut R) -> CombatCheck {
    let swing = rng.gen_range(-1..=1_i64);
    let base_level = i64::from(ctx.hero_level) + i64::from(tier.level_offset());
    let mob_level = u32::try_from((base_level + swing).max(1)).unwrap_or(1);
    let level_gap = i64::from(ctx.hero_level) - i64::from(mob_level);
    let win_pct = (MOB_BASE_WIN_PCT
        + level_gap * MOB_LEVEL_DIFF_PCT
        + ctx.class_type.combat_bonus_pct())
    .clamp(MOB_MIN_WIN_PCT, MOB_MAX_WIN_PCT);
    let roll = rng.gen_range(0..100_i64);
    CombatCheck {
        mob_level,
        win_pct,
        roll,
    }
}

fn level_scale(hero_level: u32) -> i64 {
    1 + i64::from(hero_level / LEVEL_SCALE_STEP)
}

fn roll_table<R: Rng>(table: &[&'static str], rng: &mut R) -> &'static str {
    pick(table, rng.gen_range(0..u32::MAX))
}

fn resolve_chest<R: Rng>(scale: i64, rng: &mut R) -> Resolution {
    let line = roll_table(&CHEST_LINES, rng);
    let gold = rng.gen_range(CHEST_GOLD_RANGE.0..=CHEST_GOLD_RANGE.1) * scale;
    Resolution {
        message: format!("{line} and find {gold} gold."),
        xp: CHEST_XP,
        gold,
        outcome: EventOutcome::None,
    }
}

fn resolve_trinket<R: Rng>(scale: i64, rng: &mut R) -> Resolution {
    let item = roll_table(&TRINKETS, rng);
    let xp = rng.gen_range(TRINKET_XP_RANGE.0..=TRINKET_XP_RANGE.1);
    let gold = rng.gen_range(TRINKET_GOLD_RANGE.0..=TRINKET_GOLD_RANGE.1) * scale;
    Resolution {
        message: format!("You pocket a {item} worth {gold} gold."),
        xp,
        gold,
        outcome: EventOutcome::None,
    }
}

fn resolve_quirky<R: Rng>(rng: &mut R) -> Resolution {
    let line = roll_table(&QUIRKY_LINES, rng);
    Resolution {
        message: format!("{line}."),
        xp: rng.gen_range(QUIRKY_XP_RANGE.0..=QUIRKY_XP_RANGE.1),
        gold: 0,
        outcome: EventOutcome::None,
    }
}

fn resolve_narration<R: Rng>(rng: &mut R) -> Resolution {
    let line = roll_table(&NARRATION_LINES, rng);
    Resolution {
        message: format!("{line}."),
        xp: NARRATION_XP,
        gold: 0,
        outcome: EventOutcome::None,
    }
}

fn resolve_mob<R: Rng>(ctx: &ResolveContext, tier: MobTier, rng: &mut R) -> Resolution {
    let table: &[&'static str] = match tier {
        MobTier::Minion => &MINION_NAMES,
        MobTier::Elite => &ELITE_NAMES,
        MobTier::Boss => &BOSS_NAMES,
    };
    let mob_name = roll_table(table, rng).to_string();
    let check = combat_check(ctx, tier, rng);
    let loot_roll = rng.gen_range(MOB_GOLD_RANGE.0..=MOB_GOLD_RANGE.1);
    let mob_level = check.mob_level;

    if check.won() {
        let multiplier = tier.reward_multiplier();
        Resolution {
            message: format!("You defeat the {mob_name} (lvl {mob_level})."),
            xp: i64::from(mob_level) * MOB_XP_PER_LEVEL * multiplier,
            gold: loot_roll * multiplier,
            outcome: EventOutcome::Win {
                mob_name,
                mob_level,
            },
        }
    } else {
        Resolution {
            message: format!("The {mob_name} (lvl {mob_level}) drives you back. You flee."),
            xp: MOB_FLEE_XP,
            gold: 0,
            outcome: EventOutcome::Flee {
                mob_name,
                mob_level,
            },
        }
    }
}
