//! Seed derivation for quests and their pseudo-random streams.
//!
//! A quest seed depends only on identifiers fixed at quest creation, so any
//! device can rebuild the same plan and resolutions later. Sub-streams are
//! domain-separated through HMAC-SHA256 so that planner timing, planner
//! kinds and per-event resolution never share draws.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use twox_hash::XxHash64;

use crate::constants::{QUEST_HASH_SEED, STREAM_RESOLVE_PREFIX};
use crate::hero::HeroId;
use crate::quest::{Quest, QuestId};

/// Platform-independent 64-bit hash of an identifier.
#[must_use]
pub fn stable_hash(value: &str) -> u64 {
    XxHash64::oneshot(QUEST_HASH_SEED, value.as_bytes())
}

/// Combine the start instant with stable hashes of the quest and hero ids.
#[must_use]
pub fn quest_seed(quest_id: &QuestId, hero_id: &HeroId, start_time: DateTime<Utc>) -> u64 {
    let start = start_time.timestamp_millis().cast_unsigned();
    start ^ stable_hash(quest_id.as_str()) ^ stable_hash(hero_id.as_str()).rotate_left(31)
}

/// Seed of an existing quest record.
#[must_use]
pub fn seed_for(quest: &Quest) -> u64 {
    quest_seed(&quest.id, &quest.hero_id, quest.start_time)
}

/// Derive an independent stream seed for `domain_tag`.
#[must_use]
pub fn derive_stream_seed(seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Stream seed used to resolve the planned event at `idx`.
#[must_use]
pub fn event_stream_seed(seed: u64, idx: u32) -> u64 {
    let mut tag = Vec::with_capacity(STREAM_RESOLVE_PREFIX.len() + 4);
    tag.extend_from_slice(STREAM_RESOLVE_PREFIX);
    tag.extend_from_slice(&idx.to_le_bytes());
    derive_stream_seed(seed, &tag)
}
