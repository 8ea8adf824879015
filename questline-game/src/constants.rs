//! Centralized balance and tuning constants for Questline quest logic.
//!
//! These values define the deterministic math behind planning and
//! resolution. Changing any of them changes every plan and resolution
//! derived from an existing seed, so they only move through reviewed code.

// Seed domains -------------------------------------------------------------
pub(crate) const QUEST_HASH_SEED: u64 = 0x5155_4553_544c_494e;
pub(crate) const STREAM_PLAN_COUNT: &[u8] = b"plan.count";
pub(crate) const STREAM_PLAN_TIMING: &[u8] = b"plan.timing";
pub(crate) const STREAM_PLAN_KIND: &[u8] = b"plan.kind";
pub(crate) const STREAM_RESOLVE_PREFIX: &[u8] = b"resolve:";

// Planner tuning -----------------------------------------------------------
pub(crate) const PLANNER_MINUTES_PER_EVENT: u32 = 3;
pub(crate) const PLANNER_COUNT_JITTER: u32 = 1;
pub(crate) const PLANNER_MAX_EVENTS: u32 = 64;
pub(crate) const PLANNER_MAJOR_PCT: u32 = 10;
pub(crate) const PLANNER_AFFINITY_BONUS: u32 = 10;
pub(crate) const PLANNER_LEVEL_MOB_BONUS_CAP: u32 = 10;
pub(crate) const ELITE_BASE_PCT: u32 = 10;
pub(crate) const ELITE_PCT_PER_LEVEL: u32 = 2;
pub(crate) const ELITE_MAX_PCT: u32 = 45;

// Resolver tuning ----------------------------------------------------------
pub(crate) const MAJOR_REWARD_MULTIPLIER: i64 = 2;
pub(crate) const LEVEL_SCALE_STEP: u32 = 5;
pub(crate) const CHEST_GOLD_RANGE: (i64, i64) = (5, 15);
pub(crate) const CHEST_XP: i64 = 3;
pub(crate) const TRINKET_XP_RANGE: (i64, i64) = (4, 8);
pub(crate) const TRINKET_GOLD_RANGE: (i64, i64) = (1, 5);
pub(crate) const QUIRKY_XP_RANGE: (i64, i64) = (2, 6);
pub(crate) const NARRATION_XP: i64 = 1;
pub(crate) const MOB_BASE_WIN_PCT: i64 = 65;
pub(crate) const MOB_LEVEL_DIFF_PCT: i64 = 8;
pub(crate) const MOB_MIN_WIN_PCT: i64 = 10;
pub(crate) const MOB_MAX_WIN_PCT: i64 = 95;
pub(crate) const MOB_XP_PER_LEVEL: i64 = 6;
pub(crate) const MOB_GOLD_RANGE: (i64, i64) = (1, 6);
pub(crate) const MOB_FLEE_XP: i64 = 2;

// Lifecycle ----------------------------------------------------------------
pub(crate) const MAX_QUEST_MINUTES: u32 = 24 * 60;
pub(crate) const XP_PER_LEVEL: u64 = 100;
pub(crate) const LOOT_XP_PER_MINUTE: u64 = 10;
pub(crate) const LOOT_GOLD_PER_MINUTE: u64 = 2;

// Narrative tables ---------------------------------------------------------
pub(crate) const CHEST_LINES: [&str; 4] = [
    "You pry open a dusty chest",
    "A chest half-buried in moss gives way",
    "Behind a loose stone you find a strongbox",
    "A forgotten supply crate creaks open",
];

pub(crate) const TRINKETS: [&str; 6] = [
    "brass compass",
    "glass feather",
    "lucky button",
    "silver thimble",
    "carved wolf token",
    "humming pebble",
];

pub(crate) const QUIRKY_LINES: [&str; 5] = [
    "A goose follows you for a mile, then loses interest",
    "A signpost points in four directions at once",
    "You trade riddles with a bored bridge",
    "A mushroom ring hums a tune you almost recognise",
    "Your boots briefly insist on walking backwards",
];

pub(crate) const NARRATION_LINES: [&str; 5] = [
    "The road bends toward the hills",
    "Wind combs the tall grass around you",
    "You pause to sharpen your focus",
    "Distant bells mark the passing hour",
    "The trail narrows between old pines",
];

pub(crate) const MINION_NAMES: [&str; 4] = ["Cave Rat", "Goblin Scout", "Bog Imp", "Feral Slime"];
pub(crate) const ELITE_NAMES: [&str; 3] = ["Orc Captain", "Grave Knight", "Storm Harpy"];
pub(crate) const BOSS_NAMES: [&str; 3] = [
    "Procrastination Wyrm",
    "The Idle King",
    "Doomscroll Hydra",
];
