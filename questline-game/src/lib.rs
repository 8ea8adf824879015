//! Questline Game Core
//!
//! Platform-agnostic quest logic for the Questline focus tool: seed
//! derivation, deterministic planning and resolution, and the quest
//! lifecycle reducer. This crate performs no I/O and never reads the clock;
//! the runtime crate supplies time and persistence.

pub mod config;
pub mod constants;
pub mod hero;
pub mod lifecycle;
pub mod numbers;
pub mod planner;
pub mod quest;
pub mod resolver;
pub mod seed;

// Re-export commonly used types
pub use config::{ConfigError, GameCfg, KindWeights, LifecycleCfg, LootCfg, PlannerCfg};
pub use hero::{ClassType, Hero, HeroId, LevelCurve, Loot, UnknownClass};
pub use lifecycle::{
    Effect, LifecycleError, Msg, QuestPhase, Snapshot, TickView, Transition, phase_of, reduce,
};
pub use planner::{PlanSpec, plan, plan_with};
pub use quest::{
    EventKind, EventOutcome, MobTier, PlannedEvent, Quest, QuestEvent, QuestId, QuestProgress,
    RewardTally, due_after, resolution_cursor,
};
pub use resolver::{CombatCheck, ResolveContext, combat_check, resolve};
pub use seed::{derive_stream_seed, event_stream_seed, quest_seed, seed_for, stable_hash};

/// Plan spec for an existing quest record at the hero's current level.
#[must_use]
pub fn plan_spec_for(quest: &Quest, hero_level: u32) -> PlanSpec {
    PlanSpec {
        duration_minutes: quest.duration_minutes,
        seed: seed_for(quest),
        start_at: quest.start_time,
        hero_level,
        class_type: quest.class_type,
    }
}

/// Resolution context for an existing quest record at the hero's current level.
#[must_use]
pub fn resolve_context_for(quest: &Quest, hero_level: u32) -> ResolveContext {
    ResolveContext {
        quest_id: quest.id.clone(),
        base_seed: seed_for(quest),
        hero_level,
        class_type: quest.class_type,
    }
}
